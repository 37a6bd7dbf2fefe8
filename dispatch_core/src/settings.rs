// dispatch_core/src/settings.rs

//! Configuration for an import run.
//! Defaults are derived from a base directory, optionally overridden by a JSON settings file
//! and then by command-line flags.

use std::fs;

/// Which 288-slot window decides that a day is already complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub enum DayCompleteness {
    /// Slots `[first, first + 288)` of the day.
    #[default]
    #[serde(rename = "aligned")]
    Aligned,
    /// Slots `[first + 2, first + 290)`, as checked by stores built with the historical importer.
    #[serde(rename = "legacy_offset")]
    LegacyOffset,
}

impl DayCompleteness {
    pub fn window_offset(&self) -> usize {
        match self {
            DayCompleteness::Aligned => 0,
            DayCompleteness::LegacyOffset => 2,
        }
    }
}

/// Optional JSON overrides. Relative paths are resolved against the base directory.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub generators: Option<String>,
    pub store: Option<String>,
    pub bulk_dir: Option<String>,
    pub archive_dirs: Option<Vec<String>>,
    pub day_completeness: Option<DayCompleteness>,
    pub rebuild_summaries: Option<bool>,
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub generators: Option<std::path::PathBuf>,
    pub store: Option<std::path::PathBuf>,
    pub settings_file: Option<std::path::PathBuf>,
    pub rebuild_summaries: bool,
}

/// Fully resolved settings for one import run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub base_path: std::path::PathBuf,
    pub generators_path: std::path::PathBuf,
    pub store_path: std::path::PathBuf,
    pub bulk_dir: std::path::PathBuf,
    pub archive_dirs: Vec<std::path::PathBuf>,  // Daily archives first, then 5-minute archives
    pub day_completeness: DayCompleteness,
    pub rebuild_summaries: bool,
}

impl ImportSettings {
    /// Default layout under `base_path`.
    pub fn from_base<P: AsRef<std::path::Path>>(base_path: P) -> Self {
        let base = base_path.as_ref();
        ImportSettings {
            base_path: base.to_path_buf(),
            generators_path: base.join("AEMO_GENERATORS.csv"),
            store_path: base.join("cdf").join("dispatch.cdf"),
            bulk_dir: base.join("dispatch_dvd"),
            archive_dirs: vec![base.join("dispatch_daily"), base.join("dispatch_5min")],
            day_completeness: DayCompleteness::default(),
            rebuild_summaries: false,
        }
    }

    /// Resolves defaults, the optional settings file and command-line overrides, then validates.
    /// # Arguments
    /// * `base_path` - Base directory holding the downloaded data.
    /// * `overrides` - Values given on the command line; they win over the settings file.
    /// # Returns
    /// * `anyhow::Result<ImportSettings>` containing the validated settings.
    pub fn load<P: AsRef<std::path::Path>>(
        base_path: P,
        overrides: &CliOverrides,
    ) -> anyhow::Result<Self> {
        let mut settings = Self::from_base(&base_path);

        if let Some(settings_file_path) = &overrides.settings_file {
            let contents = fs::read_to_string(settings_file_path)?;
            let file: SettingsFile = serde_json::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse settings JSON: {}", e))?;
            settings.apply_file(&file);
        }

        if let Some(generators) = &overrides.generators {
            settings.generators_path = generators.clone();
        }
        if let Some(store) = &overrides.store {
            settings.store_path = store.clone();
        }
        if overrides.rebuild_summaries {
            settings.rebuild_summaries = true;
        }

        check_args(&settings)
            .map_err(|e| anyhow::anyhow!("Settings validation failed:\n{}", e))?;

        anyhow::Ok(settings)
    }

    fn apply_file(&mut self, file: &SettingsFile) {
        let base = self.base_path.clone();
        let resolve = |p: &String| base.join(p);

        if let Some(p) = &file.generators {
            self.generators_path = resolve(p);
        }
        if let Some(p) = &file.store {
            self.store_path = resolve(p);
        }
        if let Some(p) = &file.bulk_dir {
            self.bulk_dir = resolve(p);
        }
        if let Some(dirs) = &file.archive_dirs {
            self.archive_dirs = dirs.iter().map(&resolve).collect();
        }
        if let Some(mode) = file.day_completeness {
            self.day_completeness = mode;
        }
        if let Some(rebuild) = file.rebuild_summaries {
            self.rebuild_summaries = rebuild;
        }
    }

}

fn check_args(settings: &ImportSettings) -> anyhow::Result<()> {
    // check store path
    {
        if settings.store_path.as_os_str().is_empty() {
            anyhow::bail!("Store path cannot be empty!");
        }
        if settings.store_path.is_dir() {
            anyhow::bail!("Store path {} is a directory!", settings.store_path.display());
        }
    }

    // check archive directories
    {
        if settings.archive_dirs.is_empty() {
            anyhow::bail!("Provide at least one archive directory!");
        }
    }

    anyhow::Ok(())
}
