// dispatch_core/src/archive.rs

//! Recursive walk over (possibly nested) zip archives of dispatch files.
//!
//! Entries are visited in lexicographic order. Nested archives that the store already
//! holds in full are skipped by name; data files are sniffed for their dialect and parsed.

use std::io::BufRead;
use std::io::Read;

use anyhow::Context;

use crate::row;
use crate::row::RowSink;
use crate::store;
use crate::utils;
use crate::bulk_csv;
use crate::live_csv;
use crate::completeness;

const SNIFF_BUFFER: usize = 64 * 1024;

/// Kind of an archive member, decided from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    NestedArchive,
    DataFile,
    Other,
}

impl EntryKind {
    pub fn classify(name: &str) -> Self {
        if name.ends_with('/') {
            EntryKind::Other
        } else if utils::has_extension(name, ".zip") {
            EntryKind::NestedArchive
        } else if utils::has_extension(name, ".csv") {
            EntryKind::DataFile
        } else {
            EntryKind::Other
        }
    }
}

/// One member of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Lists the members of an archive in lexicographic order.
pub fn list_entries<R: Read + std::io::Seek>(
    archive: &zip::ZipArchive<R>,
) -> Vec<ArchiveEntry> {
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
        .into_iter()
        .map(|name| ArchiveEntry { kind: EntryKind::classify(&name), name })
        .collect()
}

/// Row format of a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    LiveDispatch,
    BulkDump,
}

impl Dialect {
    /// Guesses the dialect from the start of a file.
    ///
    /// An `I` header naming the table decides first; otherwise the width of the first
    /// `D` record does. Defaults to live dispatch.
    pub fn sniff(head: &[u8]) -> Self {
        let text = String::from_utf8_lossy(head);
        for line in text.lines() {
            let fields: Vec<&str> = line.trim().split(',').collect();
            match fields[0] {
                "I" if fields.len() > 2 => match fields[2] {
                    "UNIT_SCADA" => return Dialect::LiveDispatch,
                    "UNIT_SOLUTION" => return Dialect::BulkDump,
                    _ => {}
                },
                "D" => {
                    return if fields.len() >= bulk_csv::MIN_FIELDS {
                        Dialect::BulkDump
                    } else {
                        Dialect::LiveDispatch
                    };
                }
                _ => {}
            }
        }
        Dialect::LiveDispatch
    }
}

/// When the walker makes its writes durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    /// The caller checkpoints once per top-level archive.
    PerArchive,
    /// Checkpoint after every data file that wrote at least one row.
    PerDataFile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub data_files: usize,
    pub rows: usize,
    pub skipped_archives: usize,
}

impl WalkStats {
    pub fn add(&mut self, other: WalkStats) {
        self.data_files += other.data_files;
        self.rows += other.rows;
        self.skipped_archives += other.skipped_archives;
    }
}

pub struct ArchiveWalker<'a> {
    store: &'a mut store::DispatchStore,
    policy: CheckpointPolicy,
}

impl<'a> ArchiveWalker<'a> {
    pub fn new(store: &'a mut store::DispatchStore, policy: CheckpointPolicy) -> Self {
        ArchiveWalker { store, policy }
    }

    /// Walks the archive at `path`. An unreadable archive is logged and skipped.
    pub fn walk_path(&mut self, path: &std::path::Path) -> anyhow::Result<WalkStats> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Failed to open archive {}: {}", path.display(), e);
                return anyhow::Ok(WalkStats::default());
            }
        };
        self.walk(&utils::file_name_of(path), std::io::BufReader::new(file))
    }

    /// Walks an archive held in `reader`; `name` is only used for logging.
    pub fn walk<R: Read + std::io::Seek>(&mut self, name: &str, reader: R) -> anyhow::Result<WalkStats> {
        let mut archive = match zip::ZipArchive::new(reader) {
            Ok(archive) => archive,
            Err(e) => {
                log::warn!("Skipping unreadable archive {}: {}", name, e);
                return anyhow::Ok(WalkStats::default());
            }
        };

        let mut stats = WalkStats::default();
        for entry in list_entries(&archive) {
            match entry.kind {
                EntryKind::NestedArchive => {
                    if completeness::is_source_complete(&*self.store, &entry.name) {
                        log::debug!("{}: already have {}", name, entry.name);
                        stats.skipped_archives += 1;
                        continue;
                    }
                    let bytes = match read_member(&mut archive, &entry.name) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            log::warn!("{}: {:#}", name, e);
                            continue;
                        }
                    };
                    stats.add(self.walk(&entry.name, std::io::Cursor::new(bytes))?);
                }
                EntryKind::DataFile => {
                    let member = match archive.by_name(&entry.name) {
                        Ok(member) => member,
                        Err(e) => {
                            log::warn!("{}: failed to read {}: {}", name, entry.name, e);
                            continue;
                        }
                    };
                    let rows = load_data_file(
                        std::io::BufReader::with_capacity(SNIFF_BUFFER, member),
                        &entry.name,
                        &mut *self.store,
                    )?;
                    stats.data_files += 1;
                    stats.rows += rows;
                    if rows > 0 && self.policy == CheckpointPolicy::PerDataFile {
                        self.store.checkpoint()?;
                        log::info!("{}, {} rows", entry.name, rows);
                    }
                }
                EntryKind::Other => {}
            }
        }

        anyhow::Ok(stats)
    }

}

fn read_member<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Vec<u8>> {
    let mut member = archive.by_name(name)
        .with_context(|| format!("Failed to open nested archive {}", name))?;
    let mut bytes = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read nested archive {}", name))?;
    anyhow::Ok(bytes)
}

/// Parses one data file in whichever dialect it is written and writes its rows into `sink`.
///
/// Read errors part-way through a member are logged; rows already written stay written.
///
/// # Returns
/// * Number of rows written.
pub fn load_data_file<R, S>(mut reader: R, name: &str, sink: &mut S) -> anyhow::Result<usize>
where
    R: BufRead,
    S: row::RowSink + ?Sized,
{
    let dialect = match reader.fill_buf() {
        Ok(head) => Dialect::sniff(head),
        Err(e) => {
            log::warn!("Failed to read {}: {}", name, e);
            return anyhow::Ok(0);
        }
    };

    let mut counted = CountingSink { inner: sink, accepted: 0 };
    let result = match dialect {
        Dialect::LiveDispatch => live_csv::parse_live_dispatch(reader, name).and_then(|row| match row {
            Some(row) => counted.push_row(&row).map(|_| ()),
            None => anyhow::Ok(()),
        }),
        Dialect::BulkDump => bulk_csv::load_bulk_dispatch(reader, &mut counted, name).map(|_| ()),
    };

    if let Err(e) = result {
        if e.downcast_ref::<std::io::Error>().is_some() {
            log::warn!("Failed to read {}: {}", name, e);
        } else {
            return Err(e);
        }
    }

    anyhow::Ok(counted.accepted)
}

struct CountingSink<'s, S: ?Sized> {
    inner: &'s mut S,
    accepted: usize,
}

impl<S: row::RowSink + ?Sized> row::RowSink for CountingSink<'_, S> {
    fn push_row(&mut self, row: &row::DispatchRow) -> anyhow::Result<bool> {
        let accepted = self.inner.push_row(row)?;
        if accepted {
            self.accepted += 1;
        }
        anyhow::Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_bytes(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn live_csv(timestamp: &str, generator: &str, megawatts: f32) -> Vec<u8> {
        format!(
            "I,DISPATCH,UNIT_SCADA,1,SETTLEMENTDATE,DUID,SCADAVALUE\nD,DISPATCH,UNIT_SCADA,1,\"{}\",{},{}\n",
            timestamp, generator, megawatts,
        ).into_bytes()
    }

    fn open_store(dir: &tempfile::TempDir) -> store::DispatchStore {
        store::DispatchStore::open(dir.path().join("dispatch.cdf"), crate::settings::DayCompleteness::Aligned).unwrap()
    }

    #[test]
    fn classifies_entries_by_suffix() {
        assert_eq!(EntryKind::classify("a/B.ZIP"), EntryKind::NestedArchive);
        assert_eq!(EntryKind::classify("x.Csv"), EntryKind::DataFile);
        assert_eq!(EntryKind::classify("dir.zip/"), EntryKind::Other);
        assert_eq!(EntryKind::classify("readme.txt"), EntryKind::Other);
    }

    #[test]
    fn sniffs_dialects() {
        assert_eq!(Dialect::sniff(b"C,header\nI,DISPATCH,UNIT_SOLUTION,2,X\n"), Dialect::BulkDump);
        assert_eq!(Dialect::sniff(b"I,DISPATCH,UNIT_SCADA,1,X\n"), Dialect::LiveDispatch);
        assert_eq!(Dialect::sniff(b"D,a,b,c,d,e,f,g,h,i,j,k,l,m\n"), Dialect::BulkDump);
        assert_eq!(Dialect::sniff(b"D,a,b,c,d,e,f\n"), Dialect::LiveDispatch);
        assert_eq!(Dialect::sniff(b""), Dialect::LiveDispatch);
    }

    #[test]
    fn entries_are_listed_in_lexicographic_order() {
        let bytes = zip_bytes(&[
            ("b.csv", Vec::new()),
            ("a.zip", zip_bytes(&[])),
            ("C.txt", Vec::new()),
        ]);
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = list_entries(&archive).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["C.txt", "a.zip", "b.csv"]);
    }

    #[test]
    fn walks_nested_archives() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        let inner = zip_bytes(&[
            ("PUBLIC_DISPATCHSCADA_201401010005_01.CSV", live_csv("2014/01/01 00:05:00", "A", 5.0)),
        ]);
        let outer = zip_bytes(&[
            ("PUBLIC_DISPATCHSCADA_201401010005_01.zip", inner),
            ("PUBLIC_DISPATCHSCADA_201401010010_01.zip", zip_bytes(&[
                ("x.csv", live_csv("2014/01/01 00:10:00", "B", 6.0)),
            ])),
        ]);

        let stats = ArchiveWalker::new(&mut store, CheckpointPolicy::PerArchive)
            .walk("outer.zip", std::io::Cursor::new(outer.clone()))
            .unwrap();
        assert_eq!(stats, WalkStats { data_files: 2, rows: 2, skipped_archives: 0 });

        let t = chrono::NaiveDate::from_ymd_opt(2014, 1, 1).unwrap().and_hms_opt(0, 10, 0).unwrap();
        assert_eq!(store.value_at(t, "B"), Some(6.0));

        // A second pass finds both inner archives already present.
        let stats = ArchiveWalker::new(&mut store, CheckpointPolicy::PerArchive)
            .walk("outer.zip", std::io::Cursor::new(outer))
            .unwrap();
        assert_eq!(stats, WalkStats { data_files: 0, rows: 0, skipped_archives: 2 });
    }

    #[test]
    fn corrupt_nested_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        let outer = zip_bytes(&[
            ("broken.zip", b"not a zip".to_vec()),
            ("good.csv", live_csv("2014/01/01 00:05:00", "A", 1.0)),
        ]);
        let stats = ArchiveWalker::new(&mut store, CheckpointPolicy::PerArchive)
            .walk("outer.zip", std::io::Cursor::new(outer))
            .unwrap();
        assert_eq!(stats.data_files, 1);
        assert_eq!(stats.rows, 1);
    }

    #[test]
    fn per_data_file_policy_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);
        let bulk = "D,DISPATCH,UNIT_SOLUTION,2,\"2009/07/01 00:05:00\",1,G,0,1,0,G_CP,0,1,42\n";
        let outer = zip_bytes(&[("PUBLIC_DVD_DISPATCHLOAD_200907.CSV", bulk.as_bytes().to_vec())]);

        ArchiveWalker::new(&mut store, CheckpointPolicy::PerDataFile)
            .walk("dvd.zip", std::io::Cursor::new(outer))
            .unwrap();
        assert_eq!(store.rows_since_checkpoint(), 0);
        drop(store);

        let reopened = open_store(&dir);
        let t = chrono::NaiveDate::from_ymd_opt(2009, 7, 1).unwrap().and_hms_opt(0, 5, 0).unwrap();
        assert_eq!(reopened.value_at(t, "G"), Some(42.0));
    }

    #[test]
    fn data_file_counts_only_accepted_rows() {
        struct Refusing;
        impl RowSink for Refusing {
            fn push_row(&mut self, _row: &row::DispatchRow) -> anyhow::Result<bool> {
                anyhow::Ok(false)
            }
        }
        let text = live_csv("2014/01/01 00:05:00", "A", 5.0);
        let rows = load_data_file(std::io::Cursor::new(text), "a.csv", &mut Refusing).unwrap();
        assert_eq!(rows, 0);
    }
}
