use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Wall-clock bound on every adapter request.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .expect("http client")
});

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops tags, decodes entities and collapses whitespace.
pub fn strip_html(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text)
}

/// Truncates to at most `limit` characters without splitting a character.
pub fn truncate_chars(input: &str, limit: usize) -> String {
    match input.char_indices().nth(limit) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base_url = reqwest::Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

pub fn fetch_html(url: &str) -> Result<String> {
    tracing::debug!(url, "fetching page");
    let response = CLIENT
        .get(url)
        .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .with_context(|| format!("unable to read response body for {url}"))
}

pub fn fetch_json(url: &str, query: &[(&str, String)]) -> Result<Value> {
    tracing::debug!(url, "fetching json");
    let response = CLIENT
        .get(url)
        .query(query)
        .header(ACCEPT, "application/json")
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .json()
        .with_context(|| format!("invalid json from {url}"))
}

pub fn post_form(url: &str, form: &[(&str, String)]) -> Result<Value> {
    tracing::debug!(url, "posting form");
    let response = CLIENT
        .post(url)
        .form(form)
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .json()
        .with_context(|| format!("invalid json from {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let html = "<p>Leather &amp; Lace</p>\n<br/><strong>Doors</strong>   at 9";
        assert_eq!(strip_html(html), "Leather & Lace Doors at 9");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("🐾🐾🐾", 2), "🐾🐾");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn absolute_url_joins_relative_links() {
        assert_eq!(
            absolute_url("https://www.sf.dog/events", "/events/pup-night/2026-02-20").as_deref(),
            Some("https://www.sf.dog/events/pup-night/2026-02-20")
        );
        assert_eq!(
            absolute_url("https://www.sf.dog", "https://other.example/x").as_deref(),
            Some("https://other.example/x")
        );
    }
}
