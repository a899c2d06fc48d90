use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{Local, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::base;
use super::time;
use super::EventSource;
use crate::models::Event;

const BASE_URL: &str = "https://www.sf.dog";
const EVENTS_URL: &str = "https://www.sf.dog/events";
const SOURCE_ID: &str = "sf_dog";
const SOURCE_NAME: &str = "sf.dog";
const MIN_PARAGRAPH_CHARS: usize = 20;

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("sf.dog link selector"));
static H1_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("sf.dog h1 selector"));
static H3_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3").expect("sf.dog h3 selector"));
static LI_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li").expect("sf.dog li selector"));
static P_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("sf.dog p selector"));
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(date|time|location):\s*(.*)$").expect("sf.dog field regex"));

/// Listing page links to one page per event; the details live in
/// emoji-prefixed `<li>` rows ("📅 Date: Friday, February 20, 2026").
pub struct SfDog;

impl EventSource for SfDog {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> &'static str {
        EVENTS_URL
    }

    fn fetch(&self) -> Result<Vec<Event>> {
        let listing = base::fetch_html(EVENTS_URL)?;
        let links = collect_event_links(&listing);
        tracing::debug!(source = SOURCE_ID, count = links.len(), "event links found");

        let now = Local::now().naive_local();
        let mut events = Vec::new();
        for link in links {
            let html = match base::fetch_html(&link) {
                Ok(html) => html,
                Err(err) => {
                    tracing::error!(source = SOURCE_ID, url = %link, "event page failed: {err:#}");
                    continue;
                }
            };
            let event = parse_event_page(&html, &link);
            if time::is_upcoming(event.start_datetime, now) {
                events.push(event);
            } else {
                tracing::debug!(source = SOURCE_ID, url = %link, "skipping past event");
            }
        }

        events.sort_by_key(|event| event.start_datetime);
        Ok(events)
    }
}

/// Links shaped like `/events/<slug>/<date>`, deduplicated and absolute.
pub(crate) fn collect_event_links(html: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| href.contains("/events/") && href.matches('/').count() >= 3)
        .filter_map(|href| base::absolute_url(BASE_URL, href))
        .filter(|url| url.trim_end_matches('/') != EVENTS_URL)
        .collect()
}

pub(crate) fn parse_event_page(html: &str, url: &str) -> Event {
    let document = Html::parse_document(html);
    let root = document.root_element();

    // An <h3> ending in ':' is a section header, not a subtitle.
    let title = base::first_text(&root, &H1_SELECTOR).map(|title| {
        match base::first_text(&root, &H3_SELECTOR) {
            Some(subtitle) if !subtitle.ends_with(':') => format!("{title}: {subtitle}"),
            _ => title,
        }
    });

    let mut date_text = None;
    let mut time_text = None;
    let mut location = None;
    for item in document.select(&LI_SELECTOR) {
        let text = base::inner_text(item);
        let cleaned = text.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
        let Some(caps) = FIELD_RE.captures(cleaned) else {
            continue;
        };
        let value = caps[2].trim().to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "date" => date_text = Some(value),
            "time" => time_text = Some(value),
            _ => location = Some(value),
        }
    }

    let (start_datetime, end_datetime) =
        schedule_from(date_text.as_deref(), time_text.as_deref(), url);
    if start_datetime.is_none() {
        tracing::warn!(source = SOURCE_ID, url, "no datetime found for event");
    }

    let paragraphs: Vec<String> = document
        .select(&P_SELECTOR)
        .map(base::inner_text)
        .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();
    let description = (!paragraphs.is_empty()).then(|| paragraphs.join(" "));

    Event {
        title,
        description,
        location,
        start_datetime,
        end_datetime,
        url: Some(url.to_string()),
        source: None,
    }
    .normalize()
}

/// Page date and time first, then the date embedded in the event URL.
fn schedule_from(
    date_text: Option<&str>,
    time_text: Option<&str>,
    url: &str,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    if let Some(date) = date_text.and_then(time::parse_date) {
        let (start_time, end_time) = time_text
            .map(time::parse_time_range)
            .unwrap_or((None, None));
        let (start, end) = time::combine(date, start_time, end_time);
        return (Some(start), end);
    }

    let fallback = time::date_from_url(url).map(|date| date.and_time(NaiveTime::MIN));
    (fallback, None)
}
