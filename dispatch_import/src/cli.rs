// dispatch_import/src/cli.rs

/// Structure representing command-line arguments.
#[derive(Debug)]
pub struct Args {
    pub path: std::path::PathBuf,
    pub overrides: dispatch_core::settings::CliOverrides,
}

/// Command-line arguments parser using Clap.
///
/// Takes the base data directory plus optional overrides for the generator list,
/// the store location and a settings file.
impl Args {
    /// Parses command-line arguments using `clap`.
    ///
    /// # Returns
    /// * `Args` - Struct containing parsed arguments.
    ///
    /// # Errors
    /// * If required arguments are missing or invalid.
    pub fn parse() -> Self {
        let matches = clap::Command::new("dispatch_import")
            .version("0.1.0")
            .about("Incremental importer for 5-minute generator dispatch data")
            .arg(
                clap::Arg::new("path")
                .help("Base directory holding dispatch_dvd, dispatch_daily and dispatch_5min")
                .required(true)
                .num_args(1),
            )
            .arg(
                clap::Arg::new("generators")
                .short('g')
                .long("generators")
                .help("Path to the generator list CSV (default: PATH/AEMO_GENERATORS.csv)")
                .num_args(1),
            )
            .arg(
                clap::Arg::new("cdf")
                .short('c')
                .long("cdf")
                .help("Path to the dispatch store (default: PATH/cdf/dispatch.cdf)")
                .num_args(1),
            )
            .arg(
                clap::Arg::new("settings")
                .short('s')
                .long("settings")
                .help("Path to a settings.json file")
                .num_args(1),
            )
            .arg(
                clap::Arg::new("rebuild-summaries")
                .long("rebuild-summaries")
                .help("Recompute the 30-minute and daily summaries for every observed day")
                .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        let path_arg = |name: &str| matches.get_one::<String>(name).map(std::path::PathBuf::from);

        Args {
            path: path_arg("path").unwrap_or_default(),
            overrides: dispatch_core::settings::CliOverrides {
                generators: path_arg("generators"),
                store: path_arg("cdf"),
                settings_file: path_arg("settings"),
                rebuild_summaries: matches.get_flag("rebuild-summaries"),
            },
        }
    }
}
