use std::collections::HashSet;

use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use super::base;
use super::time;
use super::EventSource;
use crate::models::Event;

const CALENDAR_URL: &str = "https://www.transform1060.org/calendar/";
const AJAX_URL: &str = "https://www.transform1060.org/wp-admin/admin-ajax.php";
const EVENT_PAGE_MARKER: &str = "transform1060.org/events/";
const SOURCE_ID: &str = "transform1060";
const SOURCE_NAME: &str = "Transform 1060";
const VENUE_NAME: &str = "Transform 1060";

static JSONLD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("transform jsonld selector")
});
static DAY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.mec-calendar-events-sec").expect("transform day section selector")
});
static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article.mec-event-article").expect("transform article"));
static DETAIL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.mec-event-detail").expect("transform detail"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("transform link"));
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-event-time").expect("transform time"));
static PLACE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-event-loc-place").expect("transform place"));
static SINGLE_TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".mec-single-event-time").expect("transform single time"));
static SINGLE_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-description").expect("transform single description")
});
static SINGLE_LOCATION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".mec-single-event-location").expect("transform single location")
});

static MONTHLY_VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)mecMonthlyView\(\s*\{(.*?)\}\s*\)").expect("mec monthly view regex")
});
static WIDGET_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"id:\s*"(\d+)""#).expect("mec widget id regex"));
static NEXT_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"next_month:\s*\{\s*year:\s*"(\d+)",\s*month:\s*"(\d+)"\s*\}"#)
        .expect("mec next month regex")
});
static ATTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"atts:\s*"([^"]*)""#).expect("mec atts regex"));
static TIME_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Time\s*").expect("time label regex"));
static LOCATION_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Location\s*").expect("location label regex"));

/// The site runs the Modern Events Calendar plugin. The calendar page embeds
/// JSON-LD for the current month; the next month is loaded over AJAX, and
/// times and descriptions live on each event's own page.
pub struct Transform1060;

/// One calendar entry before detail pages are consulted.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Listing {
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EventDetails {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl EventSource for Transform1060 {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> &'static str {
        CALENDAR_URL
    }

    fn fetch(&self) -> Result<Vec<Event>> {
        let html = base::fetch_html(CALENDAR_URL)?;
        let jsonld = extract_jsonld_listings(&html);
        tracing::debug!(source = SOURCE_ID, count = jsonld.len(), "json-ld events");

        let ajax = match next_month_form(&html) {
            Some(form) => match base::post_form(AJAX_URL, &form) {
                Ok(body) => body
                    .get("events_side")
                    .and_then(Value::as_str)
                    .map(parse_mec_events_html)
                    .unwrap_or_default(),
                Err(err) => {
                    tracing::error!(source = SOURCE_ID, "next month request failed: {err:#}");
                    Vec::new()
                }
            },
            None => {
                tracing::warn!(source = SOURCE_ID, "could not find next month config");
                Vec::new()
            }
        };
        tracing::debug!(source = SOURCE_ID, count = ajax.len(), "next month events");

        let today = Local::now().date_naive();
        let mut events = Vec::new();
        for listing in merge_listings(jsonld, ajax) {
            if listing.date < today {
                tracing::debug!(source = SOURCE_ID, date = %listing.date, "skipping past event");
                continue;
            }
            let details = listing
                .url
                .as_deref()
                .filter(|url| url.contains(EVENT_PAGE_MARKER))
                .and_then(|url| match base::fetch_html(url) {
                    Ok(html) => Some(parse_event_page(&html)),
                    Err(err) => {
                        tracing::warn!(source = SOURCE_ID, url, "event page failed: {err:#}");
                        None
                    }
                });
            events.push(build_event(listing, details));
        }

        events.sort_by_key(|event| event.start_datetime);
        Ok(events)
    }
}

pub(crate) fn extract_jsonld_listings(html: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let mut listings = Vec::new();
    for script in document.select(&JSONLD_SELECTOR) {
        let raw = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let candidates = match data {
            Value::Array(items) => items,
            other => vec![other],
        };
        listings.extend(
            candidates
                .iter()
                .filter(|item| item.get("@type").and_then(Value::as_str) == Some("Event"))
                .filter_map(jsonld_listing),
        );
    }
    listings
}

fn jsonld_listing(item: &Value) -> Option<Listing> {
    let date = item
        .get("startDate")
        .and_then(Value::as_str)
        .and_then(date_part)?;
    let end_date = item.get("endDate").and_then(Value::as_str).and_then(date_part);

    let url = item
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| item.pointer("/offers/url").and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    let address = match item.pointer("/location/address") {
        Some(Value::String(address)) => Some(address.clone()),
        Some(Value::Object(parts)) => {
            let joined = ["streetAddress", "addressLocality", "addressRegion"]
                .iter()
                .filter_map(|key| parts.get(*key).and_then(Value::as_str))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined)
        }
        _ => None,
    }
    .filter(|address| !address.trim().is_empty());

    let location = match address {
        Some(address) => format!("{VENUE_NAME}, {address}"),
        None => VENUE_NAME.to_string(),
    };

    Some(Listing {
        date,
        end_date,
        title: item
            .get("name")
            .and_then(Value::as_str)
            .map(base::strip_html),
        url,
        location: Some(location),
        start_time: None,
        end_time: None,
    })
}

fn date_part(text: &str) -> Option<NaiveDate> {
    time::parse_date(text.get(..10).unwrap_or(text))
}

/// The AJAX form that loads next month's calendar, read from the inline
/// `mecMonthlyView({...})` config.
pub(crate) fn next_month_form(html: &str) -> Option<Vec<(&'static str, String)>> {
    let config = MONTHLY_VIEW_RE.captures(html)?.get(1)?.as_str();
    let widget_id = WIDGET_ID_RE.captures(config)?[1].to_string();
    let next = NEXT_MONTH_RE.captures(config)?;
    let atts = ATTS_RE
        .captures(config)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();

    Some(vec![
        ("action", "mec_monthly_view_load_month".to_string()),
        ("mec_year", next[1].to_string()),
        ("mec_month", next[2].to_string()),
        ("id", widget_id),
        ("atts", atts),
        ("apply_sf", "0".to_string()),
    ])
}

/// Day sections carry `data-mec-cell="YYYYMMDD"`; each article inside is
/// one event on that day.
pub(crate) fn parse_mec_events_html(html: &str) -> Vec<Listing> {
    let document = Html::parse_fragment(html);
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for section in document.select(&DAY_SELECTOR) {
        let Some(date) = section
            .value()
            .attr("data-mec-cell")
            .filter(|cell| cell.len() == 8)
            .and_then(time::parse_date)
        else {
            continue;
        };

        for article in section.select(&ARTICLE_SELECTOR) {
            let placeholder = base::first_text(&article, &DETAIL_SELECTOR)
                .is_some_and(|detail| detail == "No Events");
            if placeholder {
                continue;
            }
            let Some(link) = article.select(&LINK_SELECTOR).next() else {
                continue;
            };
            let Some(url) = link.value().attr("href").map(str::to_string) else {
                continue;
            };
            if !seen.insert((url.clone(), date)) {
                continue;
            }

            let (start_time, end_time) = base::first_text(&article, &TIME_SELECTOR)
                .map(|text| time::parse_time_range(&text))
                .unwrap_or((None, None));
            let title = Some(base::inner_text(link)).filter(|title| !title.is_empty());

            listings.push(Listing {
                date,
                end_date: None,
                title,
                url: Some(url),
                location: base::first_text(&article, &PLACE_SELECTOR),
                start_time,
                end_time,
            });
        }
    }

    listings
}

/// JSON-LD entries first; AJAX entries only fill in `(url, date)` pairs the
/// calendar page did not already list.
pub(crate) fn merge_listings(jsonld: Vec<Listing>, ajax: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    jsonld
        .into_iter()
        .chain(ajax)
        .filter(|listing| seen.insert((listing.url.clone().unwrap_or_default(), listing.date)))
        .collect()
}

pub(crate) fn parse_event_page(html: &str) -> EventDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut details = EventDetails::default();

    if let Some(text) = base::first_text(&root, &SINGLE_TIME_SELECTOR) {
        let (start, end) = time::parse_time_range(&TIME_LABEL_RE.replace(&text, ""));
        details.start_time = start;
        details.end_time = end;
    }
    details.description = base::first_text(&root, &SINGLE_DESCRIPTION_SELECTOR);
    details.location = base::first_text(&root, &SINGLE_LOCATION_SELECTOR)
        .map(|text| LOCATION_LABEL_RE.replace(&text, "").trim().to_string())
        .filter(|text| !text.is_empty());
    details
}

/// Listing times win over page times; the page only fills gaps. The end
/// rolls to the next day when it falls before a known start.
pub(crate) fn build_event(listing: Listing, details: Option<EventDetails>) -> Event {
    let details = details.unwrap_or_default();
    let start_time = listing.start_time.or(details.start_time);
    let end_time = listing.end_time.or(details.end_time);

    let start = listing
        .date
        .and_time(start_time.unwrap_or(NaiveTime::MIN));
    let end = end_time.map(|end_time| match start_time {
        Some(start_time) if end_time < start_time => time::roll_overnight(start, end_time),
        _ => listing.end_date.unwrap_or(listing.date).and_time(end_time),
    });

    Event {
        title: listing.title,
        description: details.description,
        location: listing.location.or(details.location),
        start_datetime: Some(start),
        end_datetime: end,
        url: listing.url,
        source: None,
    }
    .normalize()
}
