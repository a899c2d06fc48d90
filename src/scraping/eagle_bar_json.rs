use anyhow::{Context, Result};
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;

use super::base;
use super::time;
use super::EventSource;
use crate::models::Event;

const API_URL: &str = "https://sf-eagle.com/wp-json/tribe/events/v1/events";
const SOURCE_ID: &str = "eagle_bar";
const SOURCE_NAME: &str = "SF Eagle";
const PAGE_SIZE: u32 = 50;

/// Events come from The Events Calendar's public REST endpoint rather than
/// scraped markup.
pub struct EagleBar;

#[derive(Debug, Deserialize)]
struct TribeResponse {
    #[serde(default)]
    events: Vec<Value>,
}

/// WordPress sends `false` or `[]` for empty fields, so every field decodes
/// leniently and a bad value becomes `None` instead of failing the row.
#[derive(Debug, Deserialize)]
struct TribeEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    url: Option<String>,
    #[serde(default, deserialize_with = "venue_or_empty")]
    venue: Option<TribeVenue>,
}

#[derive(Debug, Default, Deserialize)]
struct TribeVenue {
    #[serde(default, deserialize_with = "lenient_text")]
    venue: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    state: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

/// Tribe sends `"venue": []` for events without one.
fn venue_or_empty<'de, D>(deserializer: D) -> Result<Option<TribeVenue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value).ok()),
        _ => Ok(None),
    }
}

impl EventSource for EagleBar {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> &'static str {
        API_URL
    }

    fn fetch(&self) -> Result<Vec<Event>> {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        let payload = base::fetch_json(
            API_URL,
            &[("start_date", today), ("per_page", PAGE_SIZE.to_string())],
        )?;
        self.parse_payload(payload)
    }
}

impl EagleBar {
    pub(crate) fn parse_payload(&self, payload: Value) -> Result<Vec<Event>> {
        let response: TribeResponse =
            serde_json::from_value(payload).context("unexpected tribe events payload")?;
        tracing::debug!(source = SOURCE_ID, count = response.events.len(), "api returned events");

        let mut events: Vec<Event> = response
            .events
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<TribeEvent>(row) {
                Ok(raw) => Some(to_event(raw)),
                Err(err) => {
                    tracing::warn!(source = SOURCE_ID, error = %err, "skipping malformed event row");
                    None
                }
            })
            .collect();
        events.sort_by_key(|event| event.start_datetime);
        Ok(events)
    }
}

fn to_event(raw: TribeEvent) -> Event {
    let location = raw.venue.map(|venue| {
        [venue.venue, venue.address, venue.city, venue.state]
            .into_iter()
            .flatten()
            .map(|part| base::strip_html(&part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    });

    let start_datetime = raw.start_date.as_deref().and_then(time::parse_timestamp);
    if start_datetime.is_none() {
        tracing::warn!(
            source = SOURCE_ID,
            raw = raw.start_date.as_deref().unwrap_or(""),
            "unparseable start date"
        );
    }

    Event {
        title: raw.title.map(|title| base::strip_html(&title)),
        description: raw.description,
        location,
        start_datetime,
        end_datetime: raw.end_date.as_deref().and_then(time::parse_timestamp),
        url: raw.url,
        source: None,
    }
    .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "events": [
                {
                    "title": "Beer Bust &#8211; Sunday",
                    "description": "<p>The <strong>original</strong> Sunday beer bust.</p>",
                    "start_date": "2026-03-08 15:00:00",
                    "end_date": "2026-03-08 18:00:00",
                    "url": "https://sf-eagle.com/event/beer-bust/2026-03-08/",
                    "venue": {
                        "venue": "SF Eagle",
                        "address": "398 12th St",
                        "city": "San Francisco",
                        "state": "CA"
                    }
                },
                {
                    "title": "Leather Night",
                    "start_date": "2026-03-06 21:00:00",
                    "end_date": null,
                    "url": "https://sf-eagle.com/event/leather-night/",
                    "venue": []
                },
                {
                    "title": "",
                    "start_date": "soon",
                    "url": "https://sf-eagle.com/event/mystery/"
                }
            ]
        })
    }

    #[test]
    fn parses_tribe_events() {
        let events = EagleBar.parse_payload(sample()).expect("parse payload");
        assert_eq!(events.len(), 3);

        // Undated first, then ascending.
        assert_eq!(events[0].start_datetime, None);
        assert_eq!(events[0].title, None);
        assert_eq!(events[1].title.as_deref(), Some("Leather Night"));
        assert_eq!(events[1].location, None);
        assert_eq!(events[1].end_datetime, None);

        let bust = &events[2];
        assert_eq!(bust.title.as_deref(), Some("Beer Bust – Sunday"));
        assert_eq!(
            bust.description.as_deref(),
            Some("The original Sunday beer bust.")
        );
        assert_eq!(
            bust.location.as_deref(),
            Some("SF Eagle, 398 12th St, San Francisco, CA")
        );
        assert_eq!(
            bust.start_datetime.map(|s| s.to_string()).as_deref(),
            Some("2026-03-08 15:00:00")
        );
        assert_eq!(
            bust.end_datetime.map(|s| s.to_string()).as_deref(),
            Some("2026-03-08 18:00:00")
        );
    }

    #[test]
    fn wordpress_false_fields_do_not_drop_the_row() {
        let payload = json!({
            "events": [
                {
                    "title": "Beer Bust",
                    "start_date": "2026-03-08 15:00:00",
                    "url": "https://sf-eagle.com/event/beer-bust/",
                    "venue": {"venue": "SF Eagle", "address": "398 12th St"}
                },
                {
                    "title": "Bear Happy Hour",
                    "description": false,
                    "start_date": "2026-03-09 17:00:00",
                    "end_date": false,
                    "url": "https://sf-eagle.com/event/bear-happy-hour/",
                    "venue": {"venue": "SF Eagle", "address": false, "city": 94103}
                },
                "not an event"
            ]
        });

        let events = EagleBar.parse_payload(payload).expect("parse payload");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title.as_deref(), Some("Beer Bust"));
        assert_eq!(events[0].location.as_deref(), Some("SF Eagle, 398 12th St"));

        let happy_hour = &events[1];
        assert_eq!(happy_hour.title.as_deref(), Some("Bear Happy Hour"));
        assert_eq!(happy_hour.description, None);
        assert_eq!(happy_hour.end_datetime, None);
        assert_eq!(happy_hour.location.as_deref(), Some("SF Eagle"));
        assert!(happy_hour.start_datetime.is_some());
    }

    #[test]
    fn tolerates_missing_events_key() {
        let events = EagleBar.parse_payload(json!({})).expect("parse empty");
        assert!(events.is_empty());
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(EagleBar.parse_payload(json!("oops")).is_err());
    }
}
