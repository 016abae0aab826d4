use chrono::DateTime;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    static ref ISO_DURATION_RE: Regex = Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,]\d+)?S)?)?$"
    )
    .unwrap();
}

/// Converts an ISO-8601 duration to whole seconds, truncating fractions.
///
/// Returns `None` for anything that is not a well-formed duration, and for
/// durations with year or month components, which have no fixed length.
pub fn parse_duration_secs(raw: &str) -> Option<i64> {
    let caps = ISO_DURATION_RE.captures(raw)?;
    // "P", "PT" and "P1DT" all match the grammar above but carry no value
    if raw.ends_with('T') || caps.iter().skip(1).all(|group| group.is_none()) {
        return None;
    }

    let component = |index: usize| -> Option<i64> {
        match caps.get(index) {
            Some(m) => m.as_str().parse::<i64>().ok(),
            None => Some(0),
        }
    };

    if component(1)? != 0 || component(2)? != 0 {
        return None;
    }

    let weeks = component(3)?;
    let days = component(4)?;
    let hours = component(5)?;
    let minutes = component(6)?;
    let seconds = component(7)?;

    weeks
        .checked_mul(7 * 86_400)?
        .checked_add(days.checked_mul(86_400)?)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Parses a counter sent as a decimal string. `None` when it is not an integer.
pub fn parse_count(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

/// Keeps a timestamp only if it is RFC 3339, which both destinations accept.
pub fn parse_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw).ok().map(|_| raw.to_string())
}

pub fn parse_caption(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// `thumbnails.standard.url`, or `None` if any level is missing.
pub fn standard_thumbnail_url(thumbnails: &Map<String, Value>) -> Option<String> {
    thumbnails
        .get("standard")?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}
