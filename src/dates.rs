//! Date normalization for the two representations the sites produce.
//!
//! Article pages print localized Spanish dates ("3 de enero de 2025 10:30"),
//! while sitemaps, JSON-LD blocks, and meta tags carry ISO-8601-like strings.
//! Localized parsing is lossy by design: a string that does not fit the known
//! shape is returned unchanged as [`DateValue::Raw`] and the pipeline keeps
//! going, so the corpus date column holds a mix of both representations.

use crate::models::DateValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Month names as printed on article pages, with their two-digit codes.
const MONTHS: [(&str, &str); 12] = [
    ("enero", "01"),
    ("febrero", "02"),
    ("marzo", "03"),
    ("abril", "04"),
    ("mayo", "05"),
    ("junio", "06"),
    ("julio", "07"),
    ("agosto", "08"),
    ("septiembre", "09"),
    ("octubre", "10"),
    ("noviembre", "11"),
    ("diciembre", "12"),
];

static DE_CONNECTOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bde\b").unwrap());

/// Normalize a localized date string like `"3 de enero de 2025 10:30"`.
///
/// Lowercases, swaps the first recognized month name for its numeric code,
/// drops `de` connectors and hyphens, then parses as `day month year hh:mm`.
/// On failure the original string is returned unchanged inside
/// [`DateValue::Raw`] and a warning is logged; this is never fatal.
pub fn normalize_localized(raw: &str) -> DateValue {
    let mut s = raw.to_lowercase();
    for (name, code) in MONTHS {
        if s.contains(name) {
            s = s.replacen(name, code, 1);
            break;
        }
    }
    let s = DE_CONNECTOR.replace_all(&s, "");
    let s = s.replace('-', "");
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");

    match NaiveDateTime::parse_from_str(&collapsed, "%d %m %Y %H:%M") {
        Ok(ts) => DateValue::Timestamp(ts),
        Err(e) => {
            warn!(raw, error = %e, "Could not parse localized date; keeping raw text");
            DateValue::Raw(raw.to_string())
        }
    }
}

/// Parse an ISO-8601-like string from a sitemap `lastmod`, JSON-LD block, or
/// meta tag.
///
/// A trailing `Z` is treated as `+00:00`. Accepts full RFC-3339 stamps with
/// offsets, offsetless `YYYY-MM-DDTHH:MM:SS`, and falls back to reading the
/// first 10 characters as a bare calendar date. Returns `None` when nothing
/// fits; absence is not an error here.
pub fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let s = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        s.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.naive_local());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts);
    }
    if s.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
