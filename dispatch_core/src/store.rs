// dispatch_core/src/store.rs

//! Persistent multi-resolution dispatch store.
//! Owns the generator registry, the epoch, the 5-minute matrix with its observed mask,
//! the derived 30-minute and daily summaries and the set of dates awaiting a summary recompute.

use crate::grid;
use crate::row;
use crate::format;
use crate::matrix;
use crate::registry;
use crate::settings;

/// Derived mean/min/max for one day, produced by the aggregation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub date: chrono::NaiveDate,
    pub observed: usize,
    pub mean: Vec<f32>,
    pub min: Vec<f32>,
    pub max: Vec<f32>,
    pub half_hours: Vec<Option<Vec<f32>>>,  // HALF_HOURS_PER_DAY windows, None when unobserved
}

/// Read-only view of one day of 5-minute data.
/// Slots past the end of the store read as unobserved zero rows.
pub struct DayView<'a> {
    store: &'a DispatchStore,
    first_slot: usize,
}

impl<'a> DayView<'a> {
    pub fn generator_count(&self) -> usize {
        self.store.registry.len()
    }

    /// `offset` is relative to the first slot of the day.
    pub fn is_observed(&self, offset: usize) -> bool {
        self.store.seen.get(self.first_slot + offset).is_some_and(|&seen| seen != 0)
    }

    pub fn values(&self, offset: usize) -> Option<&'a [f32]> {
        self.store.dispatch_5min.row(self.first_slot + offset)
    }

}

pub struct DispatchStore {
    path: std::path::PathBuf,
    grid: grid::GridIndexer,
    registry: registry::GeneratorRegistry,
    dispatch_5min: matrix::Matrix,
    seen: Vec<u8>,  // One flag per 5-minute slot
    dispatch_30min: matrix::Matrix,
    dispatch_daily: matrix::Matrix,
    dispatch_daily_min: matrix::Matrix,
    dispatch_daily_max: matrix::Matrix,
    dirty_dates: std::collections::BTreeSet<chrono::NaiveDate>,
    day_completeness: settings::DayCompleteness,
    rows_since_checkpoint: usize,
}

impl DispatchStore {
    /// Opens the store at `path` for update, creating it (and its parent directory) if absent.
    ///
    /// # Errors
    /// * The file exists but cannot be read or decoded. This is fatal for an import run.
    pub fn open<P: AsRef<std::path::Path>>(
        path: P,
        day_completeness: settings::DayCompleteness,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let new_file = !path.exists();
        let store_file = if new_file {
            log::info!("Creating new dispatch store {}", path.display());
            format::StoreFile::empty()
        } else {
            format::StoreFile::read(&path)?
        };

        let mut store = Self::from_store_file(path, store_file, day_completeness)?;
        if new_file {
            store.checkpoint()?;
        }

        log::info!(
            "Opened dispatch store {}: {} generators, {} slots, epoch {}",
            store.path.display(),
            store.registry.len(),
            store.row_count(),
            store.grid.epoch().map(|d| d.to_string()).unwrap_or_else(|| "unset".to_string()),
        );

        anyhow::Ok(store)
    }

    fn from_store_file(
        path: std::path::PathBuf,
        store_file: format::StoreFile,
        day_completeness: settings::DayCompleteness,
    ) -> anyhow::Result<Self> {
        let registry = registry::GeneratorRegistry::from_cells(&store_file.gen_id_cells)?;

        anyhow::Ok(DispatchStore {
            path,
            grid: grid::GridIndexer::new(store_file.start_date),
            registry,
            dispatch_5min: store_file.dispatch_5min,
            seen: store_file.seen,
            dispatch_30min: store_file.dispatch_30min,
            dispatch_daily: store_file.dispatch_daily,
            dispatch_daily_min: store_file.dispatch_daily_min,
            dispatch_daily_max: store_file.dispatch_daily_max,
            dirty_dates: store_file.pending_dates.into_iter().collect(),
            day_completeness,
            rows_since_checkpoint: 0,
        })
    }

    /// Makes every write since the previous checkpoint durable.
    /// The matrices are encoded from where they live; only the id cells and
    /// pending dates are copied.
    pub fn checkpoint(&mut self) -> anyhow::Result<()> {
        let gen_id_cells = self.registry.to_cells();
        let pending_dates: Vec<chrono::NaiveDate> = self.dirty_dates.iter().copied().collect();
        format::StoreFileRef {
            format_tag: format::FORMAT_TAG,
            format_version: format::FORMAT_VERSION,
            start_date: self.grid.epoch(),
            gen_id_cells: &gen_id_cells,
            dispatch_5min: &self.dispatch_5min,
            seen: &self.seen,
            dispatch_30min: &self.dispatch_30min,
            dispatch_daily: &self.dispatch_daily,
            dispatch_daily_min: &self.dispatch_daily_min,
            dispatch_daily_max: &self.dispatch_daily_max,
            pending_dates: &pending_dates,
        }
        .write(&self.path)?;
        log::debug!(
            "Checkpointed {} ({} rows since last checkpoint)",
            self.path.display(),
            self.rows_since_checkpoint,
        );
        self.rows_since_checkpoint = 0;
        anyhow::Ok(())
    }

    pub fn epoch(&self) -> Option<chrono::NaiveDate> {
        self.grid.epoch()
    }

    pub fn generator_ids(&self) -> &[String] {
        self.registry.ids()
    }

    pub fn generator_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of allocated 5-minute slots. Zero for a newly created store.
    pub fn row_count(&self) -> usize {
        self.dispatch_5min.rows()
    }

    pub fn rows_since_checkpoint(&self) -> usize {
        self.rows_since_checkpoint
    }

    /// Column index of `id`, adding a zero-filled column to every matrix if it is unseen.
    pub fn index_of(&mut self, id: &str) -> anyhow::Result<usize> {
        let (index, added) = self.registry.register(id)?;
        if added {
            for m in [
                &mut self.dispatch_5min,
                &mut self.dispatch_30min,
                &mut self.dispatch_daily,
                &mut self.dispatch_daily_min,
                &mut self.dispatch_daily_max,
            ] {
                m.push_column();
            }
        }
        anyhow::Ok(index)
    }

    /// Registers each id in order and checkpoints once.
    ///
    /// # Returns
    /// * Number of generators that were new to the store.
    pub fn add_generators(&mut self, ids: &[String]) -> anyhow::Result<usize> {
        let before = self.registry.len();
        for id in ids {
            if let Err(e) = self.index_of(id) {
                log::warn!("Skipping generator from list: {}", e);
            }
        }
        self.checkpoint()?;
        anyhow::Ok(self.registry.len() - before)
    }

    /// Writes one 5-minute row.
    ///
    /// Only the generators present in `values` are overwritten. The slot is marked
    /// observed and its date marked dirty even when `values` is empty.
    ///
    /// # Returns
    /// * `false` if the timestamp precedes the epoch and the row was dropped.
    pub fn write_row(
        &mut self,
        timestamp: chrono::NaiveDateTime,
        values: &std::collections::BTreeMap<String, f32>,
    ) -> anyhow::Result<bool> {
        let Some(slot) = self.grid.slot_for(timestamp, true) else {
            log::warn!(
                "Can't add data from {} before start date {:?}",
                timestamp,
                self.grid.epoch(),
            );
            return anyhow::Ok(false);
        };

        let mut resolved = Vec::with_capacity(values.len());
        for (id, &megawatts) in values {
            let known = self.registry.get(id).is_some();
            match self.index_of(id) {
                Ok(index) => {
                    if !known {
                        log::warn!("Adding station {}", id);
                    }
                    resolved.push((index, megawatts));
                }
                Err(e) => log::warn!("Dropping value at {}: {}", timestamp, e),
            }
        }

        let row = self.dispatch_5min.row_mut(slot);
        for (index, megawatts) in resolved {
            row[index] = megawatts;
        }
        if self.seen.len() <= slot {
            self.seen.resize(slot + 1, 0);
        }
        self.seen[slot] = 1;

        self.dirty_dates.insert(timestamp.date());
        self.rows_since_checkpoint += 1;

        anyhow::Ok(true)
    }

    /// True iff the slot for `timestamp` exists and has been observed.
    pub fn has_slot_data(&self, timestamp: chrono::NaiveDateTime) -> bool {
        self.grid
            .lookup(timestamp)
            .and_then(|slot| self.seen.get(slot))
            .is_some_and(|&seen| seen != 0)
    }

    /// True iff the day's completeness window is fully observed.
    /// The window position is selected by `DayCompleteness`.
    pub fn has_day_data(&self, date: chrono::NaiveDate) -> bool {
        let Some(first) = self.grid.day_start_slot(date) else {
            return false;
        };
        if first + grid::SLOTS_PER_DAY > self.seen.len() {
            return false;
        }

        let start = first + self.day_completeness.window_offset();
        let end = start + grid::SLOTS_PER_DAY;
        match self.seen.get(start..end) {
            Some(window) => window.iter().all(|&seen| seen != 0),
            None => false,
        }
    }

    /// Stored 5-minute value, or `None` for an unknown generator or slot.
    pub fn value_at(&self, timestamp: chrono::NaiveDateTime, id: &str) -> Option<f32> {
        let slot = self.grid.lookup(timestamp)?;
        self.dispatch_5min.get(slot, self.registry.get(id)?)
    }

    /// `(mean, min, max)` for one generator on one day.
    pub fn daily_summary(&self, date: chrono::NaiveDate, id: &str) -> Option<(f32, f32, f32)> {
        let day = self.grid.day_start_slot(date)? / grid::SLOTS_PER_DAY;
        let col = self.registry.get(id)?;
        Some((
            self.dispatch_daily.get(day, col)?,
            self.dispatch_daily_min.get(day, col)?,
            self.dispatch_daily_max.get(day, col)?,
        ))
    }

    /// Mean of the 30-minute window containing `timestamp`.
    pub fn half_hour_mean(&self, timestamp: chrono::NaiveDateTime, id: &str) -> Option<f32> {
        let slot = self.grid.lookup(timestamp)?;
        self.dispatch_30min.get(slot / grid::SLOTS_PER_HALF_HOUR, self.registry.get(id)?)
    }

    pub fn dirty_dates(&self) -> &std::collections::BTreeSet<chrono::NaiveDate> {
        &self.dirty_dates
    }

    /// Hands the dirty dates to the caller, leaving the set empty.
    pub fn take_dirty_dates(&mut self) -> std::collections::BTreeSet<chrono::NaiveDate> {
        std::mem::take(&mut self.dirty_dates)
    }

    /// Marks every date that has at least one observed slot as dirty.
    pub fn mark_all_dates_dirty(&mut self) -> usize {
        let mut marked = 0;
        for (day, slots) in self.seen.chunks(grid::SLOTS_PER_DAY).enumerate() {
            if !slots.iter().any(|&seen| seen != 0) {
                continue;
            }
            if let Some(date) = self.grid.date_of_slot(day * grid::SLOTS_PER_DAY) {
                if self.dirty_dates.insert(date) {
                    marked += 1;
                }
            }
        }
        marked
    }

    pub fn day_view(&self, date: chrono::NaiveDate) -> Option<DayView<'_>> {
        let first_slot = self.grid.day_start_slot(date)?;
        Some(DayView { store: self, first_slot })
    }

    /// Overwrites the summary rows for `summary.date`.
    pub fn put_day_summary(&mut self, summary: &DaySummary) -> anyhow::Result<()> {
        let Some(first_slot) = self.grid.day_start_slot(summary.date) else {
            anyhow::bail!("Summary date {} precedes store start date", summary.date);
        };
        let gens = self.registry.len();
        for (name, v) in [("mean", &summary.mean), ("min", &summary.min), ("max", &summary.max)] {
            if v.len() != gens {
                anyhow::bail!("Daily {} for {} has {} values, expected {}", name, summary.date, v.len(), gens);
            }
        }

        let day = first_slot / grid::SLOTS_PER_DAY;
        self.dispatch_daily.row_mut(day).copy_from_slice(&summary.mean);
        self.dispatch_daily_min.row_mut(day).copy_from_slice(&summary.min);
        self.dispatch_daily_max.row_mut(day).copy_from_slice(&summary.max);

        let first_half_hour = first_slot / grid::SLOTS_PER_HALF_HOUR;
        for (i, window) in summary.half_hours.iter().enumerate() {
            if let Some(mean) = window {
                if mean.len() != gens {
                    anyhow::bail!("Half-hour {} of {} has {} values, expected {}", i, summary.date, mean.len(), gens);
                }
                self.dispatch_30min.row_mut(first_half_hour + i).copy_from_slice(mean);
            }
        }

        anyhow::Ok(())
    }

}

impl row::RowSink for DispatchStore {
    fn push_row(&mut self, row: &row::DispatchRow) -> anyhow::Result<bool> {
        DispatchStore::write_row(self, row.timestamp, &row.values)
    }
}

impl std::fmt::Debug for DispatchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchStore")
            .field("path", &self.path)
            .field("epoch", &self.grid.epoch())
            .field("generators", &self.registry.len())
            .field("rows", &self.row_count())
            .field("dirty_dates", &self.dirty_dates.len())
            .finish()
    }
}
