pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod scraping;
pub mod sinks;
mod utils;

use serde::Serialize;

use aggregator::{Aggregator, SourceReport};
use config::AppConfig;
use dispatch::{DispatchSummary, Dispatcher};
use ledger::{Ledger, LedgerError};
use scraping::EventSource;
use sinks::{home_assistant::HomeAssistantSink, Sink};

/// What one pass of gather-then-dispatch did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub gathered: usize,
    pub dispatch: DispatchSummary,
}

/// One batch run: every source, then every sink, against one ledger.
pub struct Pipeline {
    aggregator: Aggregator,
    ledger: Ledger,
    sinks: Vec<Box<dyn Sink>>,
}

impl Pipeline {
    pub fn new(aggregator: Aggregator, ledger: Ledger, sinks: Vec<Box<dyn Sink>>) -> Self {
        Self {
            aggregator,
            ledger,
            sinks,
        }
    }

    /// Opens the ledger before anything is scraped, so a broken store stops
    /// the run before any delivery is attempted.
    pub fn from_config(
        config: &AppConfig,
        sources: Vec<Box<dyn EventSource>>,
    ) -> anyhow::Result<Self> {
        let ledger = Ledger::open(&config.ledger_path)?;
        tracing::debug!(path = %ledger.path().display(), "ledger ready");
        let sinks: Vec<Box<dyn Sink>> = vec![Box::new(HomeAssistantSink::from_config(config)?)];
        let aggregator = Aggregator::new(sources, config.undated_order);
        Ok(Self::new(aggregator, ledger, sinks))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn run(&self) -> Result<RunReport, LedgerError> {
        let gathered = self.aggregator.gather();
        for report in &gathered.reports {
            match &report.error {
                Some(error) => tracing::warn!(source = %report.source, %error, "source contributed nothing"),
                None => tracing::info!(source = %report.source, events = report.events, "source ok"),
            }
        }

        let dispatch = Dispatcher::new(&self.ledger).publish(&gathered.events, &self.sinks)?;
        dispatch.log();

        Ok(RunReport {
            sources: gathered.reports,
            gathered: gathered.events.len(),
            dispatch,
        })
    }
}
