use std::any::Any;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::models::Event;
use crate::scraping::EventSource;

/// Where events without a start time land in the master list.
///
/// `First` matches sorting on the raw timestamp string, where the empty
/// string precedes every date. This controls notification order downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedOrder {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub events: usize,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Default)]
pub struct Gathered {
    pub events: Vec<Event>,
    pub reports: Vec<SourceReport>,
}

pub struct Aggregator {
    sources: Vec<Box<dyn EventSource>>,
    undated: UndatedOrder,
}

impl Aggregator {
    pub fn new(sources: Vec<Box<dyn EventSource>>, undated: UndatedOrder) -> Self {
        Self { sources, undated }
    }

    /// Runs every source in turn and merges the results into one list
    /// ordered by start time. A source that errors or panics contributes
    /// nothing and is reported; the others are unaffected.
    pub fn gather(&self) -> Gathered {
        let mut gathered = Gathered::default();

        for source in &self.sources {
            let id = source.source_id();
            tracing::info!(source = id, "scraping");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.fetch()))
                .unwrap_or_else(|payload| {
                    Err(anyhow::anyhow!("source panicked: {}", panic_message(&*payload)))
                });

            match outcome {
                Ok(events) => {
                    tracing::info!(source = id, count = events.len(), "events collected");
                    gathered.reports.push(SourceReport {
                        source: id.to_string(),
                        events: events.len(),
                        error: None,
                    });
                    gathered
                        .events
                        .extend(events.into_iter().map(|mut event| {
                            event.source = Some(id.to_string());
                            event
                        }));
                }
                Err(err) => {
                    tracing::error!(source = id, "source failed: {err:#}");
                    gathered.reports.push(SourceReport {
                        source: id.to_string(),
                        events: 0,
                        error: Some(format!("{err:#}")),
                    });
                }
            }
        }

        sort_events(&mut gathered.events, self.undated);
        tracing::info!(total = gathered.events.len(), "master list assembled");
        gathered
    }
}

/// Stable: events with equal start times keep their gathered order.
pub fn sort_events(events: &mut [Event], undated: UndatedOrder) {
    events.sort_by(|a, b| match (a.start_datetime, b.start_datetime) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => match undated {
            UndatedOrder::First => Ordering::Less,
            UndatedOrder::Last => Ordering::Greater,
        },
        (Some(_), None) => match undated {
            UndatedOrder::First => Ordering::Greater,
            UndatedOrder::Last => Ordering::Less,
        },
    });
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
