use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::Event;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Stable key for one logical event: SHA-256 over `title|start|url`.
///
/// Only the schedule-defining fields contribute, so re-parsed descriptions
/// or locations never produce a second delivery. Distinct events sharing all
/// three fields collapse into one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventIdentity(String);

impl EventIdentity {
    pub fn of(event: &Event) -> Self {
        let start = event
            .start_datetime
            .map(|start| start.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(event.title.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(start.as_bytes());
        hasher.update(b"|");
        hasher.update(event.url.as_deref().unwrap_or("").as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
