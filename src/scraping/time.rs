//! Date and time normalization shared by every source.
//!
//! Sites publish times as "8pm - 2am (doors at 7)", "Time8:00 PM - 12:00 AM",
//! dates as "Friday, February 20, 2026", "February 14" plus a schedule year,
//! or "20260214" cells. Everything here turns those into naive local
//! `chrono` values; nothing here knows about timezones.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m\.?").expect("valid clock regex")
});
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid paren regex"));
static RANGE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–—]+\s*|\s+to\s+").expect("valid range regex"));
static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})")
        .expect("valid date regex")
});
static URL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})-(\d{2})(?:-(\d{2}))?").expect("valid url date regex"));

/// "8pm", "8:30 PM", "12am", "11:15 p.m." to a 24-hour time.
pub fn to_24h(text: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) {
        return None;
    }
    let pm = caps.get(3)?.as_str().eq_ignore_ascii_case("p");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Splits "8pm - 2am (doors at 7)" into start and end. Either side may be
/// missing or unparseable.
pub fn parse_time_range(text: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let cleaned = PAREN_RE.replace_all(text, "");
    let mut parts = RANGE_SPLIT_RE.splitn(cleaned.trim(), 2);
    let start = parts.next().and_then(to_24h);
    let end = parts.next().and_then(to_24h);
    (start, end)
}

/// Parses the date formats the sources publish. For strings listing several
/// dates ("Saturday, April 19, 2025, Saturday, April 26, 2025") the first
/// one wins.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    for fmt in ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    MONTH_DAY_YEAR_RE.captures_iter(trimmed).find_map(|caps| {
        let candidate = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
        NaiveDate::parse_from_str(&candidate, "%B %d %Y").ok()
    })
}

/// "February 14" or "Feb 14" in a known year.
pub fn parse_month_day(text: &str, year: i32) -> Option<NaiveDate> {
    let candidate = format!("{} {year}", text.trim().trim_end_matches('.'));
    NaiveDate::parse_from_str(&candidate, "%B %d %Y").ok()
}

/// Accepts `YYYY-MM-DD HH:MM:SS` as well as the `T`-separated form.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// End on the day of `start`, or the next day when the end time-of-day is
/// earlier than the start ("8pm - 2am").
pub fn roll_overnight(start: NaiveDateTime, end_time: NaiveTime) -> NaiveDateTime {
    let end = start.date().and_time(end_time);
    if end_time < start.time() {
        end + Duration::days(1)
    } else {
        end
    }
}

/// Builds the start and end of an event held on `date`. An unknown start
/// time means midnight; the end only rolls over when the start time is
/// actually known.
pub fn combine(
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
) -> (NaiveDateTime, Option<NaiveDateTime>) {
    let start = date.and_time(start_time.unwrap_or(NaiveTime::MIN));
    let end = end_time.map(|end_time| match start_time {
        Some(_) => roll_overnight(start, end_time),
        None => date.and_time(end_time),
    });
    (start, end)
}

/// Events without a start are kept: an unknown date is treated as the
/// indefinite future.
pub fn is_upcoming(start: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    start.map_or(true, |start| start >= now)
}

/// "/events/slut-puppy/2026-02" or ".../2026-02-20". Missing days are the 1st.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE_RE.captures(url)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps.get(3).map_or(Some(1), |d| d.as_str().parse().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn converts_twelve_hour_clock() {
        assert_eq!(to_24h("8pm"), Some(t(20, 0)));
        assert_eq!(to_24h("8:30 PM"), Some(t(20, 30)));
        assert_eq!(to_24h("12am"), Some(t(0, 0)));
        assert_eq!(to_24h("12pm"), Some(t(12, 0)));
        assert_eq!(to_24h("12:15 AM"), Some(t(0, 15)));
        assert_eq!(to_24h("11 p.m."), Some(t(23, 0)));
        assert_eq!(to_24h(" 9AM"), Some(t(9, 0)));
    }

    #[test]
    fn rejects_non_clock_text() {
        assert_eq!(to_24h("doors at 7"), None);
        assert_eq!(to_24h("13pm"), None);
        assert_eq!(to_24h("0am"), None);
        assert_eq!(to_24h(""), None);
    }

    #[test]
    fn parses_time_ranges() {
        assert_eq!(
            parse_time_range("8pm - 2am (doors at 7)"),
            (Some(t(20, 0)), Some(t(2, 0)))
        );
        assert_eq!(
            parse_time_range("8:00 PM - 12:00 AM"),
            (Some(t(20, 0)), Some(t(0, 0)))
        );
        assert_eq!(parse_time_range("9pm–3am"), (Some(t(21, 0)), Some(t(3, 0))));
        assert_eq!(parse_time_range("4pm to 8pm"), (Some(t(16, 0)), Some(t(20, 0))));
        assert_eq!(parse_time_range("7pm"), (Some(t(19, 0)), None));
        assert_eq!(parse_time_range("TBA"), (None, None));
    }

    #[test]
    fn parses_published_date_formats() {
        assert_eq!(parse_date("Friday, February 20, 2026"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("February 20, 2026"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("Fri, Feb 20, 2026"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("Feb 20, 2026"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("2026-02-20"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("20260220"), Some(d(2026, 2, 20)));
        assert_eq!(parse_date("sometime soon"), None);
    }

    #[test]
    fn takes_first_of_multi_date_strings() {
        assert_eq!(
            parse_date("Saturday, April 19, 2025, Saturday, April 26, 2025"),
            Some(d(2025, 4, 19))
        );
    }

    #[test]
    fn parses_month_day_with_schedule_year() {
        assert_eq!(parse_month_day("February 14", 2026), Some(d(2026, 2, 14)));
        assert_eq!(parse_month_day("Apr 11", 2026), Some(d(2026, 4, 11)));
        assert_eq!(parse_month_day("Smarch 1", 2026), None);
    }

    #[test]
    fn parses_both_timestamp_separators() {
        let expected = d(2026, 3, 7).and_time(t(21, 0));
        assert_eq!(parse_timestamp("2026-03-07 21:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-07T21:00:00"), Some(expected));
        assert_eq!(parse_timestamp("not a time"), None);
    }

    #[test]
    fn rolls_overnight_end_to_next_day() {
        let (start, end) = combine(d(2026, 2, 14), Some(t(20, 0)), Some(t(2, 0)));
        assert_eq!(start.to_string(), "2026-02-14 20:00:00");
        assert_eq!(
            end.map(|e| e.format("%Y-%m-%dT%H:%M:%S").to_string()).as_deref(),
            Some("2026-02-15T02:00:00")
        );
    }

    #[test]
    fn same_day_end_stays_on_start_date() {
        let (_, end) = combine(d(2026, 2, 14), Some(t(16, 0)), Some(t(20, 0)));
        assert_eq!(end, Some(d(2026, 2, 14).and_time(t(20, 0))));
    }

    #[test]
    fn rolls_across_month_and_year_boundaries() {
        let start = d(2026, 12, 31).and_time(t(22, 0));
        assert_eq!(roll_overnight(start, t(1, 30)), d(2027, 1, 1).and_time(t(1, 30)));
    }

    #[test]
    fn unknown_start_time_means_midnight_without_rollover() {
        let (start, end) = combine(d(2026, 2, 14), None, Some(t(2, 0)));
        assert_eq!(start, d(2026, 2, 14).and_time(NaiveTime::MIN));
        assert_eq!(end, Some(d(2026, 2, 14).and_time(t(2, 0))));
    }

    #[test]
    fn undated_events_count_as_upcoming() {
        let now = d(2026, 5, 1).and_time(t(12, 0));
        assert!(is_upcoming(None, now));
        assert!(is_upcoming(Some(now), now));
        assert!(!is_upcoming(Some(d(2026, 4, 30).and_time(t(23, 0))), now));
    }

    #[test]
    fn extracts_dates_from_event_urls() {
        assert_eq!(
            date_from_url("https://www.sf.dog/events/slut-puppy/2026-02"),
            Some(d(2026, 2, 1))
        );
        assert_eq!(
            date_from_url("https://www.sf.dog/events/pup-night/2026-03-21"),
            Some(d(2026, 3, 21))
        );
        assert_eq!(date_from_url("https://www.sf.dog/events/pup-night"), None);
    }
}
