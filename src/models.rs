//! Data models for discovered URLs and persisted article records.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`ArticleRecord`]: one parsed article, the unit appended to the corpus
//! - [`DateValue`]: the mixed date column (parsed timestamp or leftover text)
//! - [`DiscoveryCandidate`]: a URL produced by a discovery strategy, not yet
//!   checked against the corpus
//! - [`RunOutcome`]: terminal classification of a pipeline run
//!
//! The corpus `date` column intentionally tolerates both representations:
//! localized date strings that fail to parse are persisted as-is rather than
//! aborting the batch, so every consumer must branch on the [`DateValue`] tag.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// Placeholder written when every extraction strategy for a field fails.
///
/// Distinct from an empty string: an empty `body` means full text was not
/// requested, while `not found` means it was requested and absent.
pub const FIELD_MISSING: &str = "not found";

/// A date that either parsed into a timestamp or stayed raw text.
///
/// Serialized as the ISO-8601 timestamp for `Timestamp`, or the original
/// string for `Raw`, which is exactly what lands in the corpus `date` column.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    /// Successfully normalized publication timestamp.
    Timestamp(NaiveDateTime),
    /// The original text, kept when normalization failed or never ran.
    Raw(String),
}

impl DateValue {
    /// The parsed timestamp, if this value carries one.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            DateValue::Timestamp(ts) => Some(*ts),
            DateValue::Raw(_) => None,
        }
    }
}

impl Serialize for DateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateValue::Timestamp(ts) => {
                serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            DateValue::Raw(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for DateValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S") {
            Ok(ts) => Ok(DateValue::Timestamp(ts)),
            Err(_) => Ok(DateValue::Raw(s)),
        }
    }
}

/// One parsed article, keyed by `url`.
///
/// Field order matches the corpus column order: `date, title, summary, body,
/// url, section, id, status`. The full schema is always written; `id` and
/// `status` are only populated in sitemap mode and serialize as empty cells
/// otherwise. A record is immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Publication date, parsed or raw (see [`DateValue`]).
    pub date: DateValue,
    pub title: String,
    pub summary: String,
    /// Full article text, or empty when `--with-text` was not requested.
    pub body: String,
    /// Natural key; pairwise distinct across the corpus.
    pub url: String,
    pub section: String,
    /// Numeric token from the article URL, sitemap mode only.
    pub id: Option<String>,
    /// HTTP status the article was fetched with, sitemap mode only.
    pub status: Option<u16>,
}

/// A URL yielded by a discovery strategy, not yet verified against the corpus.
#[derive(Debug, Clone)]
pub struct DiscoveryCandidate {
    pub url: String,
    /// Last-modified hint from the sitemap, when present and parseable.
    /// Informational only; the window filter uses the extracted date.
    pub hint: Option<NaiveDateTime>,
}

/// A sitemap-index entry, with the year-month its URL embeds (if any).
///
/// Entries without a month token cannot be pruned and are always fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapRef {
    pub loc: String,
    pub month: Option<(i32, u32)>,
}

/// Terminal classification of a run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// At least one record was appended to the corpus.
    Ingested(usize),
    /// Discovery produced nothing: no sitemaps resolved or no listing
    /// candidates at all. Usually a configuration or connectivity problem.
    NoCandidates,
    /// Candidates existed but none survived dedup, extraction, and the date
    /// filters. The upstream data genuinely has no matches.
    NoMatches,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Ingested(_) => 0,
            RunOutcome::NoCandidates => 2,
            RunOutcome::NoMatches => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn date_value_serializes_timestamp_as_iso() {
        let v = DateValue::Timestamp(ts(2025, 1, 3, 10, 30));
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"2025-01-03T10:30:00\"");
    }

    #[test]
    fn date_value_serializes_raw_unchanged() {
        let v = DateValue::Raw("not a date".to_string());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"not a date\"");
    }

    #[test]
    fn date_value_round_trips_through_deserialize() {
        let v: DateValue = serde_json::from_str("\"2025-01-03T10:30:00\"").unwrap();
        assert_eq!(v, DateValue::Timestamp(ts(2025, 1, 3, 10, 30)));

        let v: DateValue = serde_json::from_str("\"3 de enero\"").unwrap();
        assert_eq!(v, DateValue::Raw("3 de enero".to_string()));
    }

    #[test]
    fn record_csv_row_has_full_schema() {
        let record = ArticleRecord {
            date: DateValue::Timestamp(ts(2025, 2, 10, 8, 0)),
            title: "Título".to_string(),
            summary: "Resumen".to_string(),
            body: String::new(),
            url: "https://www.ambito.com/politica/nota-x".to_string(),
            section: "politica".to_string(),
            id: None,
            status: None,
        };

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&record).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,title,summary,body,url,section,id,status"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("2025-02-10T08:00:00,Título,Resumen,,"));
        assert!(row.ends_with(",politica,,"));
    }

    #[test]
    fn run_outcome_exit_codes_are_distinct() {
        assert_eq!(RunOutcome::Ingested(5).exit_code(), 0);
        assert_eq!(RunOutcome::NoCandidates.exit_code(), 2);
        assert_eq!(RunOutcome::NoMatches.exit_code(), 3);
    }
}
