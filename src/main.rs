use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use event_scrape_lib::aggregator::Aggregator;
use event_scrape_lib::config::AppConfig;
use event_scrape_lib::{logging, scraping, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "event-scrape", version, about = "Scrape venue listings and publish new events")]
struct Cli {
    /// JSON config file; defaults to config.json in the data directory
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Delivery ledger location (overrides config and DB_PATH)
    #[arg(long, value_name = "PATH")]
    ledger: Option<PathBuf>,

    /// Only run the source with this id
    #[arg(long, value_name = "ID")]
    source: Option<String>,

    /// Print the merged event list as JSON and deliver nothing
    #[arg(long)]
    dry_run: bool,

    /// Print the registered sources and exit
    #[arg(long)]
    list_sources: bool,

    /// Log at debug level regardless of RUST_LOG
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    // A missing .env is normal.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("event-scrape: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(ledger) = cli.ledger {
        config.ledger_path = ledger;
    }
    logging::init(cli.debug, config.log_file.as_deref())?;

    if cli.list_sources {
        let listing = serde_json::to_string_pretty(&scraping::list_sources())?;
        println!("{listing}");
        return Ok(());
    }

    let sources = match cli.source.as_deref() {
        Some(id) => scraping::select_source(id)?,
        None => scraping::registered_sources(),
    };

    if cli.dry_run {
        let gathered = Aggregator::new(sources, config.undated_order).gather();
        let listing = serde_json::to_string_pretty(&gathered.events)
            .context("cannot serialize event list")?;
        println!("{listing}");
        tracing::info!(events = gathered.events.len(), "dry run, nothing delivered");
        return Ok(());
    }

    let pipeline = Pipeline::from_config(&config, sources).inspect_err(|err| {
        tracing::error!("cannot start pipeline: {err:#}");
    })?;
    let report = pipeline.run().inspect_err(|err| {
        tracing::error!("run aborted: {err}");
    })?;
    tracing::debug!(report = %serde_json::to_string(&report)?, "run complete");
    tracing::info!(
        events = report.gathered,
        sent = report.dispatch.total_sent(),
        skipped = report.dispatch.total_skipped(),
        failed = report.dispatch.total_failed(),
        "done"
    );
    Ok(())
}
