// dispatch_import/src/main.rs

mod cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let start_time = std::time::Instant::now();

    let args = cli::Args::parse();
    let settings = dispatch_core::settings::ImportSettings::load(&args.path, &args.overrides)?;
    log::info!("Importing dispatch data under {}", settings.base_path.display());

    let report = dispatch_core::ingest::run_import(&settings)?;

    log::info!(
        "Import finished: {} generators added, {} data files, {} rows, {} archives already present, {} days summarised",
        report.generators_seeded,
        report.data_files,
        report.rows,
        report.skipped_archives,
        report.summarised_days,
    );
    log::info!("The import is finished in {:.3} seconds", start_time.elapsed().as_secs_f64());
    anyhow::Ok(())
}
