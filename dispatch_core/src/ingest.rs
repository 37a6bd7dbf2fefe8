// dispatch_core/src/ingest.rs

//! Ingestion driver: seeds generators, imports the historical tree into a fresh store,
//! scans the archive directories and finishes with the aggregation pass.

use crate::store;
use crate::utils;
use crate::archive;
use crate::settings;
use crate::generators;
use crate::aggregation;
use crate::completeness;

/// Totals for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub generators_seeded: usize,
    pub data_files: usize,
    pub rows: usize,
    pub skipped_archives: usize,
    pub summarised_days: usize,
}

impl ImportReport {
    fn add_walk(&mut self, stats: archive::WalkStats) {
        self.data_files += stats.data_files;
        self.rows += stats.rows;
        self.skipped_archives += stats.skipped_archives;
    }
}

/// Runs a complete import as described by `settings`.
///
/// # Errors
/// * The store cannot be opened, decoded or checkpointed. Source problems are only logged.
pub fn run_import(settings: &settings::ImportSettings) -> anyhow::Result<ImportReport> {
    let mut report = ImportReport::default();

    let generator_ids = generators::read_generators_csv(&settings.generators_path)?;
    let mut store = store::DispatchStore::open(&settings.store_path, settings.day_completeness)?;
    report.generators_seeded = store.add_generators(&generator_ids)?;

    if store.row_count() == 0 {
        report.add_walk(load_bulk_tree(&mut store, &settings.bulk_dir)?);
    }

    for dir in &settings.archive_dirs {
        report.add_walk(load_archive_dir(&mut store, dir)?);
    }

    report.summarised_days = if settings.rebuild_summaries {
        aggregation::rebuild_summaries(&mut store)?
    } else {
        aggregation::update_summaries(&mut store)?
    };

    anyhow::Ok(report)
}

/// Recursively imports a historical dump tree, depth first in name order.
/// Checkpoints after every data file that wrote rows.
pub fn load_bulk_tree(store: &mut store::DispatchStore, dir: &std::path::Path) -> anyhow::Result<archive::WalkStats> {
    if !dir.is_dir() {
        log::info!("No bulk dispatch data in {}", dir.display());
        return anyhow::Ok(archive::WalkStats::default());
    }
    log::info!("*** Scanning for bulk dispatch data in {} ***", dir.display());

    let entries = match utils::sorted_dir_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("{:#}", e);
            return anyhow::Ok(archive::WalkStats::default());
        }
    };

    let mut stats = archive::WalkStats::default();
    for path in entries {
        let name = utils::file_name_of(&path);
        if path.is_dir() {
            stats.add(load_bulk_tree(store, &path)?);
        } else if utils::has_extension(&name, ".zip") {
            stats.add(archive::ArchiveWalker::new(store, archive::CheckpointPolicy::PerDataFile).walk_path(&path)?);
        } else if utils::has_extension(&name, ".csv") {
            stats.add(load_plain_csv(store, &path)?);
        }
    }

    anyhow::Ok(stats)
}

fn load_plain_csv(store: &mut store::DispatchStore, path: &std::path::Path) -> anyhow::Result<archive::WalkStats> {
    let name = utils::file_name_of(path);
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Failed to open {}: {}", path.display(), e);
            return anyhow::Ok(archive::WalkStats::default());
        }
    };

    let rows = archive::load_data_file(std::io::BufReader::with_capacity(64 * 1024, file), &name, &mut *store)?;
    if rows > 0 {
        store.checkpoint()?;
        log::info!("{}, {} rows", name, rows);
    }

    anyhow::Ok(archive::WalkStats { data_files: 1, rows, skipped_archives: 0 })
}

/// Imports every archive in `dir` (not recursive) that the store does not already hold.
/// Checkpoints after each archive that wrote rows.
pub fn load_archive_dir(store: &mut store::DispatchStore, dir: &std::path::Path) -> anyhow::Result<archive::WalkStats> {
    if !dir.is_dir() {
        log::warn!("Zip file directory {} does not exist", dir.display());
        return anyhow::Ok(archive::WalkStats::default());
    }

    let entries = match utils::sorted_dir_entries(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("{:#}", e);
            return anyhow::Ok(archive::WalkStats::default());
        }
    };

    let mut stats = archive::WalkStats::default();
    for path in entries {
        let name = utils::file_name_of(&path);
        if !utils::has_extension(&name, ".zip") {
            continue;
        }
        if completeness::is_source_complete(store, &name) {
            stats.skipped_archives += 1;
            continue;
        }

        let walked = archive::ArchiveWalker::new(store, archive::CheckpointPolicy::PerArchive).walk_path(&path)?;
        if walked.rows > 0 {
            store.checkpoint()?;
            log::info!("{}, {} rows", name, walked.rows);
        }
        stats.add(walked);
    }

    anyhow::Ok(stats)
}
