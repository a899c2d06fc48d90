use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::aggregator::panic_message;
use crate::identity::EventIdentity;
use crate::ledger::{Ledger, LedgerError};
use crate::models::Event;
use crate::sinks::{Sink, SinkError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberSummary {
    pub subscriber: String,
    #[serde(flatten)]
    pub counts: DeliveryCounts,
}

/// Outcome of one publish run, one entry per sink in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub subscribers: Vec<SubscriberSummary>,
}

impl DispatchSummary {
    pub fn get(&self, subscriber: &str) -> Option<DeliveryCounts> {
        self.subscribers
            .iter()
            .find(|summary| summary.subscriber == subscriber)
            .map(|summary| summary.counts)
    }

    pub fn total_sent(&self) -> usize {
        self.subscribers.iter().map(|s| s.counts.sent).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.subscribers.iter().map(|s| s.counts.skipped).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.subscribers.iter().map(|s| s.counts.failed).sum()
    }

    pub fn log(&self) {
        tracing::info!("dispatch summary");
        for summary in &self.subscribers {
            tracing::info!(
                subscriber = %summary.subscriber,
                sent = summary.counts.sent,
                skipped = summary.counts.skipped,
                failed = summary.counts.failed,
                "{}: {} sent, {} already sent, {} failed",
                summary.subscriber,
                summary.counts.sent,
                summary.counts.skipped,
                summary.counts.failed,
            );
        }
    }
}

/// Delivers each event to each sink at most once, using the ledger as the
/// memory of what already went out.
pub struct Dispatcher<'a> {
    ledger: &'a Ledger,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Already-delivered pairs are skipped without touching the sink. A
    /// failed or panicking send is counted and not recorded, so the next run retries it;
    /// it never stops the remaining events or sinks. Only ledger errors
    /// abort, since without the ledger duplicates cannot be ruled out.
    pub fn publish(
        &self,
        events: &[Event],
        sinks: &[Box<dyn Sink>],
    ) -> Result<DispatchSummary, LedgerError> {
        let mut summary = DispatchSummary::default();

        for sink in sinks {
            let name = sink.name();
            tracing::info!(subscriber = name, "publishing");
            let mut counts = DeliveryCounts::default();

            for event in events {
                let identity = EventIdentity::of(event);
                if self.ledger.has_been_sent(&identity, name)? {
                    counts.skipped += 1;
                    continue;
                }

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.send(event)))
                    .unwrap_or_else(|payload| {
                        Err(SinkError::Panicked(panic_message(&*payload)))
                    });
                match outcome {
                    Ok(()) => {
                        self.ledger.record_sent(&identity, name)?;
                        counts.sent += 1;
                    }
                    Err(err) => {
                        tracing::error!(
                            subscriber = name,
                            title = event.title_or("untitled"),
                            %identity,
                            "delivery failed: {err}"
                        );
                        counts.failed += 1;
                    }
                }
            }

            summary.subscribers.push(SubscriberSummary {
                subscriber: name.to_string(),
                counts,
            });
        }

        Ok(summary)
    }
}
