use chrono::{Duration, NaiveDateTime};
use reqwest::blocking::Client;
use serde::Serialize;

use super::{Sink, SinkError};
use crate::config::AppConfig;
use crate::models::Event;

pub const SUBSCRIBER_NAME: &str = "home_assistant";
const DEFAULT_SUMMARY: &str = "Event";
const HA_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Body of Home Assistant's `calendar.create_event` service call.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CreateEventPayload {
    pub entity_id: String,
    pub summary: String,
    pub start_date_time: String,
    pub end_date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

pub struct HomeAssistantSink {
    base_url: String,
    token: Option<String>,
    entity_id: String,
    fallback_duration: Duration,
    client: Client,
}

impl HomeAssistantSink {
    /// A missing token is not an error here: every send then fails and the
    /// events stay queued until one is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|err| SinkError::Http(err.to_string()))?;

        Ok(Self {
            base_url: config.ha_url.trim_end_matches('/').to_string(),
            token: config
                .ha_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            entity_id: config.ha_calendar_entity.clone(),
            fallback_duration: config.fallback_duration(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/services/calendar/create_event", self.base_url)
    }

    /// Home Assistant requires an end, so one is synthesized from the
    /// configured fallback duration when the source gave none.
    pub fn build_payload(&self, event: &Event) -> Result<CreateEventPayload, SinkError> {
        let start = event
            .start_datetime
            .ok_or(SinkError::MissingField("start time"))?;
        let end = event
            .end_datetime
            .unwrap_or_else(|| start + self.fallback_duration);

        Ok(CreateEventPayload {
            entity_id: self.entity_id.clone(),
            summary: event.title_or(DEFAULT_SUMMARY).to_string(),
            start_date_time: format_time(start),
            end_date_time: format_time(end),
            description: event.description.clone(),
            location: event.location.clone(),
        })
    }
}

impl Sink for HomeAssistantSink {
    fn name(&self) -> &str {
        SUBSCRIBER_NAME
    }

    fn send(&self, event: &Event) -> Result<(), SinkError> {
        let token = self
            .token
            .as_deref()
            .ok_or(SinkError::NotConfigured("HA_TOKEN"))?;
        let payload = self.build_payload(event)?;
        tracing::info!(
            summary = %payload.summary,
            start = %payload.start_date_time,
            "creating calendar event"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&payload)
            .send()
            .map_err(|err| SinkError::Http(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "calendar event created");
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn format_time(value: NaiveDateTime) -> String {
    value.format(HA_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::time::parse_timestamp;

    fn sink(token: Option<&str>) -> HomeAssistantSink {
        let config = AppConfig {
            ha_url: "http://ha.lan:8123/".to_string(),
            ha_token: token.map(str::to_string),
            ha_calendar_entity: "calendar.parties".to_string(),
            ..AppConfig::default()
        };
        HomeAssistantSink::from_config(&config).expect("build sink")
    }

    fn event() -> Event {
        Event {
            title: Some("Frolic".to_string()),
            description: Some("Dance party".to_string()),
            location: Some("Folsom Foundry".to_string()),
            start_datetime: parse_timestamp("2026-02-14T20:00:00"),
            end_datetime: parse_timestamp("2026-02-15T02:00:00"),
            url: Some("https://www.frolicparty.com/".to_string()),
            source: Some("frolic".to_string()),
        }
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            sink(Some("t")).endpoint(),
            "http://ha.lan:8123/api/services/calendar/create_event"
        );
    }

    #[test]
    fn payload_uses_space_separated_times() {
        let payload = sink(Some("t")).build_payload(&event()).expect("payload");
        assert_eq!(
            payload,
            CreateEventPayload {
                entity_id: "calendar.parties".to_string(),
                summary: "Frolic".to_string(),
                start_date_time: "2026-02-14 20:00:00".to_string(),
                end_date_time: "2026-02-15 02:00:00".to_string(),
                description: Some("Dance party".to_string()),
                location: Some("Folsom Foundry".to_string()),
            }
        );
    }

    #[test]
    fn missing_end_falls_back_to_configured_duration() {
        let mut event = event();
        event.end_datetime = None;
        event.title = None;
        event.description = None;

        let payload = sink(Some("t")).build_payload(&event).expect("payload");
        assert_eq!(payload.end_date_time, "2026-02-14 22:00:00");
        assert_eq!(payload.summary, "Event");

        let json = serde_json::to_value(&payload).expect("serialize");
        assert!(json.get("description").is_none());
        assert_eq!(json["location"], "Folsom Foundry");
    }

    #[test]
    fn missing_start_fails_only_this_delivery() {
        let mut event = event();
        event.start_datetime = None;
        let err = sink(Some("t")).send(&event).expect_err("no start");
        assert!(matches!(err, SinkError::MissingField(_)));
    }

    #[test]
    fn missing_token_fails_without_network() {
        for token in [None, Some("   ")] {
            let err = sink(token).send(&event()).expect_err("no token");
            assert!(matches!(err, SinkError::NotConfigured("HA_TOKEN")));
        }
    }
}
