use anyhow::Result;
use chrono::{Local, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::base;
use super::time;
use super::EventSource;
use crate::models::Event;

const URL: &str = "https://www.frolicparty.com/";
const SOURCE_ID: &str = "frolic";
const SOURCE_NAME: &str = "Frolic";
const EVENT_TITLE: &str = "Frolic";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("frolic title selector"));
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.style8").expect("frolic time selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.style5").expect("frolic body selector"));
static VENUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"at the (.+)").expect("venue regex"));
static SCHEDULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s+Saturday dates?:\s*(.+)$").expect("frolic schedule regex")
});
static DATE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*(?:and\s+)?|\s+and\s+").expect("frolic date split regex"));

/// Every party shares one time and place; only the Saturday dates change.
pub struct Frolic;

impl EventSource for Frolic {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> &'static str {
        URL
    }

    fn fetch(&self) -> Result<Vec<Event>> {
        let html = base::fetch_html(URL)?;
        Ok(self.parse_document(&html, Local::now().naive_local()))
    }
}

impl Frolic {
    pub(crate) fn parse_document(&self, html: &str, now: NaiveDateTime) -> Vec<Event> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let location = base::first_text(&root, &TITLE_SELECTOR).and_then(|title| {
            VENUE_RE
                .captures(&title)
                .map(|caps| caps[1].trim().to_string())
        });

        let mut start_time = NaiveTime::from_hms_opt(20, 0, 0);
        let mut end_time = NaiveTime::from_hms_opt(2, 0, 0);
        if let Some(text) = base::first_text(&root, &TIME_SELECTOR) {
            let (start, end) = time::parse_time_range(&text);
            start_time = start.or(start_time);
            end_time = end.or(end_time);
            tracing::debug!(text = %text, ?start_time, ?end_time, "frolic time range");
        }

        let body: Vec<String> = document
            .select(&BODY_SELECTOR)
            .map(base::inner_text)
            .collect();

        let description = body
            .iter()
            .find(|text| text.contains("crazy idea") || text.contains("furry friends"))
            .cloned();

        let schedule = body.iter().find_map(|text| {
            let caps = SCHEDULE_RE.captures(text)?;
            let year: i32 = caps[1].parse().ok()?;
            let dates: Vec<String> = DATE_SPLIT_RE
                .split(&caps[2])
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            Some((year, dates))
        });

        let Some((year, dates)) = schedule.filter(|(_, dates)| !dates.is_empty()) else {
            tracing::warn!(source = SOURCE_ID, "no schedule found on page");
            return Vec::new();
        };

        let mut events = Vec::new();
        for date_text in dates {
            let Some(date) = time::parse_month_day(&date_text, year) else {
                tracing::warn!(source = SOURCE_ID, date_text = %date_text, "failed to parse date");
                continue;
            };
            let (start, end) = time::combine(date, start_time, end_time);
            if !time::is_upcoming(Some(start), now) {
                tracing::debug!(source = SOURCE_ID, %start, "skipping past event");
                continue;
            }
            events.push(
                Event {
                    title: Some(EVENT_TITLE.to_string()),
                    description: description.clone(),
                    location: location.clone(),
                    start_datetime: Some(start),
                    end_datetime: end,
                    url: Some(URL.to_string()),
                    source: None,
                }
                .normalize(),
            );
        }

        events.sort_by_key(|event| event.start_datetime);
        events
    }
}
