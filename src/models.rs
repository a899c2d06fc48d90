use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::scraping::base;

/// Upper bound on `Event::description`, in characters.
pub const DESCRIPTION_LIMIT: usize = 500;

/// The normalized shape every source produces. Times are naive local time.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_datetime: Option<NaiveDateTime>,
    pub end_datetime: Option<NaiveDateTime>,
    pub url: Option<String>,
    /// Set by the aggregator, never by a source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Event {
    pub fn title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title.as_deref().unwrap_or(fallback)
    }

    /// Enforces the event invariants: blank text becomes absent, the
    /// description is markup-free and bounded, and an end before the start
    /// is dropped rather than the whole event.
    pub fn normalize(mut self) -> Self {
        self.title = non_blank(self.title.map(|t| base::clean_text(&t)));
        self.location = non_blank(self.location.map(|l| base::clean_text(&l)));
        self.url = non_blank(self.url.map(|u| u.trim().to_string()));
        self.description = non_blank(
            self.description
                .map(|d| base::truncate_chars(&base::strip_html(&d), DESCRIPTION_LIMIT)),
        );

        if let (Some(start), Some(end)) = (self.start_datetime, self.end_datetime) {
            if end < start {
                tracing::warn!(
                    title = self.title_or("untitled"),
                    %start,
                    %end,
                    "dropping end time earlier than start"
                );
                self.end_datetime = None;
            }
        }
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
