// dispatch_core/src/format.rs

//! On-disk layout of the dispatch store.
//! Saved as a single bincode document, read back through a memory map.

use anyhow::Context;

use crate::matrix;

pub const FORMAT_TAG: &str = "dispatch-store";
pub const FORMAT_VERSION: u32 = 1;

/// Everything persisted for one store instance.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreFile {
    pub format_tag: String,
    pub format_version: u32,
    pub start_date: Option<chrono::NaiveDate>,  // Slot zero; set once
    pub gen_id_cells: Vec<u8>,                  // GEN_ID_WIDTH bytes per generator
    pub dispatch_5min: matrix::Matrix,
    pub seen: Vec<u8>,                          // One flag per 5-minute slot
    pub dispatch_30min: matrix::Matrix,
    pub dispatch_daily: matrix::Matrix,
    pub dispatch_daily_min: matrix::Matrix,
    pub dispatch_daily_max: matrix::Matrix,
    pub pending_dates: Vec<chrono::NaiveDate>,  // Dates awaiting summary recompute
}

impl StoreFile {
    pub fn empty() -> Self {
        StoreFile {
            format_tag: FORMAT_TAG.to_string(),
            format_version: FORMAT_VERSION,
            start_date: None,
            gen_id_cells: Vec::new(),
            dispatch_5min: matrix::Matrix::new(0),
            seen: Vec::new(),
            dispatch_30min: matrix::Matrix::new(0),
            dispatch_daily: matrix::Matrix::new(0),
            dispatch_daily_min: matrix::Matrix::new(0),
            dispatch_daily_max: matrix::Matrix::new(0),
            pending_dates: Vec::new(),
        }
    }

    /// Maps `path` and decodes it.
    pub fn read(path: &std::path::Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open store file {}", path.display()))?;
        // SAFETY: the map is dropped as soon as decoding returns, and the store file is
        // only ever replaced by renaming a new file over it, never truncated in place.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .with_context(|| format!("Failed to map store file {}", path.display()))?;

        let store_file: StoreFile = bincode::deserialize(&mmap[..])
            .with_context(|| format!("Store file {} is corrupt", path.display()))?;
        store_file.validate()
            .with_context(|| format!("Store file {} is corrupt", path.display()))?;

        anyhow::Ok(store_file)
    }

    /// Borrowed view with the same encoding as `self`.
    pub fn view(&self) -> StoreFileRef<'_> {
        StoreFileRef {
            format_tag: &self.format_tag,
            format_version: self.format_version,
            start_date: self.start_date,
            gen_id_cells: &self.gen_id_cells,
            dispatch_5min: &self.dispatch_5min,
            seen: &self.seen,
            dispatch_30min: &self.dispatch_30min,
            dispatch_daily: &self.dispatch_daily,
            dispatch_daily_min: &self.dispatch_daily_min,
            dispatch_daily_max: &self.dispatch_daily_max,
            pending_dates: &self.pending_dates,
        }
    }

    pub fn write(&self, path: &std::path::Path) -> anyhow::Result<()> {
        self.view().write(path)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.format_tag != FORMAT_TAG {
            anyhow::bail!("Unknown format tag '{}'", self.format_tag);
        }
        if self.format_version != FORMAT_VERSION {
            anyhow::bail!("Unsupported format version {}", self.format_version);
        }

        let gens = self.gen_id_cells.len() / crate::registry::GEN_ID_WIDTH;
        let matrices = [
            ("dispatch_5min", &self.dispatch_5min),
            ("dispatch_30min", &self.dispatch_30min),
            ("dispatch_daily", &self.dispatch_daily),
            ("dispatch_daily_min", &self.dispatch_daily_min),
            ("dispatch_daily_max", &self.dispatch_daily_max),
        ];
        for (name, m) in matrices {
            m.validate(name)?;
            if m.cols() != gens {
                anyhow::bail!("Matrix '{}' has {} columns for {} generators", name, m.cols(), gens);
            }
        }

        if self.seen.len() != self.dispatch_5min.rows() {
            anyhow::bail!(
                "Observed mask has {} slots but dispatch_5min has {} rows",
                self.seen.len(),
                self.dispatch_5min.rows(),
            );
        }

        if self.start_date.is_none() && !self.seen.is_empty() {
            anyhow::bail!("Store has rows but no start date");
        }

        anyhow::Ok(())
    }

}

/// Borrowed counterpart of `StoreFile` used for checkpoints, so the matrices are encoded
/// where they live. Field order and encodings must stay in step with `StoreFile`.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct StoreFileRef<'a> {
    pub format_tag: &'a str,
    pub format_version: u32,
    pub start_date: Option<chrono::NaiveDate>,
    pub gen_id_cells: &'a [u8],
    pub dispatch_5min: &'a matrix::Matrix,
    pub seen: &'a [u8],
    pub dispatch_30min: &'a matrix::Matrix,
    pub dispatch_daily: &'a matrix::Matrix,
    pub dispatch_daily_min: &'a matrix::Matrix,
    pub dispatch_daily_max: &'a matrix::Matrix,
    pub pending_dates: &'a [chrono::NaiveDate],
}

impl StoreFileRef<'_> {
    /// Writes to a sibling temporary file, then renames it over `path`.
    pub fn write(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let mut tmp_name = path.file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        {
            let file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            let mut writer = std::io::BufWriter::new(file);
            bincode::serialize_into(&mut writer, self)
                .with_context(|| format!("Failed to encode store into {}", tmp_path.display()))?;
            let file = writer.into_inner()
                .map_err(|e| anyhow::anyhow!("Failed to flush {}: {}", tmp_path.display(), e.error()))?;
            file.sync_all()?;
        }

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace store file {}", path.display()))?;

        anyhow::Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_restores_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.cdf");

        let mut store_file = StoreFile::empty();
        store_file.start_date = chrono::NaiveDate::from_ymd_opt(2014, 1, 1);
        store_file.gen_id_cells = vec![0u8; crate::registry::GEN_ID_WIDTH];
        store_file.gen_id_cells[0] = b'G';
        for m in [
            &mut store_file.dispatch_5min,
            &mut store_file.dispatch_30min,
            &mut store_file.dispatch_daily,
            &mut store_file.dispatch_daily_min,
            &mut store_file.dispatch_daily_max,
        ] {
            m.push_column();
        }
        store_file.dispatch_5min.set(3, 0, 42.5);
        store_file.seen = vec![0, 0, 0, 1];
        store_file.write(&path).unwrap();

        let restored = StoreFile::read(&path).unwrap();
        assert_eq!(restored.start_date, store_file.start_date);
        assert_eq!(restored.dispatch_5min, store_file.dispatch_5min);
        assert_eq!(restored.seen, store_file.seen);
        assert!(!dir.path().join("dispatch.cdf.tmp").exists());
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.cdf");
        std::fs::write(&path, b"definitely not a store").unwrap();
        assert!(StoreFile::read(&path).is_err());
    }

    #[test]
    fn mask_shape_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.cdf");
        let mut store_file = StoreFile::empty();
        store_file.start_date = chrono::NaiveDate::from_ymd_opt(2014, 1, 1);
        store_file.seen = vec![1];
        store_file.write(&path).unwrap();
        assert!(StoreFile::read(&path).is_err());
    }

    #[test]
    fn borrowed_view_encodes_like_owned_file() {
        let mut store_file = StoreFile::empty();
        store_file.start_date = chrono::NaiveDate::from_ymd_opt(2014, 1, 1);
        store_file.gen_id_cells = vec![b'G'; crate::registry::GEN_ID_WIDTH];
        for m in [
            &mut store_file.dispatch_5min,
            &mut store_file.dispatch_30min,
            &mut store_file.dispatch_daily,
            &mut store_file.dispatch_daily_min,
            &mut store_file.dispatch_daily_max,
        ] {
            m.push_column();
        }
        store_file.dispatch_5min.set(1, 0, 7.5);
        store_file.dispatch_daily_max.set(0, 0, 7.5);
        store_file.seen = vec![0, 1];
        store_file.pending_dates = vec![chrono::NaiveDate::from_ymd_opt(2014, 1, 1).unwrap()];

        let owned = bincode::serialize(&store_file).unwrap();
        let borrowed = bincode::serialize(&store_file.view()).unwrap();
        assert_eq!(owned, borrowed);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.cdf");
        store_file.view().write(&path).unwrap();
        let restored = StoreFile::read(&path).unwrap();
        assert_eq!(restored.dispatch_5min, store_file.dispatch_5min);
        assert_eq!(restored.dispatch_daily_max, store_file.dispatch_daily_max);
        assert_eq!(restored.seen, store_file.seen);
        assert_eq!(restored.pending_dates, store_file.pending_dates);
    }
}
