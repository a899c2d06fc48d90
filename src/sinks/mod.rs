pub mod home_assistant;

use thiserror::Error;

use crate::models::Event;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("missing {0}")]
    NotConfigured(&'static str),
    #[error("event has no {0}")]
    MissingField(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("sink panicked: {0}")]
    Panicked(String),
}

/// A downstream destination that takes one event at a time.
///
/// Expected failures (missing credentials, a field the destination needs,
/// HTTP errors) come back as `Err`; the dispatcher counts them and leaves
/// the event eligible for the next run. A panic is caught and treated the
/// same way.
pub trait Sink {
    /// Ledger key for this subscriber. Must stay stable across runs.
    fn name(&self) -> &str;
    fn send(&self, event: &Event) -> Result<(), SinkError>;
}
