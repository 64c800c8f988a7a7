//! Sitemap index resolver.
//!
//! Resolves the site's sitemap indices down to the leaf sitemaps worth
//! fetching, then extracts `(url, lastmod)` pairs from each leaf. Index
//! entries whose URL embeds a `YYYY-MM` token are pruned against the
//! requested date window before any leaf is fetched; entries with no month
//! hint are treated as possibly relevant and always kept.
//!
//! Leaves are sometimes served gzip-compressed even under an `.xml` URL, so
//! payloads are sniffed and decompressed transparently.

use crate::discovery::matches_sections;
use crate::dates::parse_iso;
use crate::fetch::{FetchedPage, Fetcher};
use crate::models::{DiscoveryCandidate, SitemapRef};
use chrono::{Months, NaiveDate};
use flate2::read::GzDecoder;
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::io::Read;
use tracing::{info, warn};

pub const BASE: &str = "https://www.lanacion.com.ar";

/// Monthly/annual historical index.
const INDEX_HISTORICAL: &str = "https://www.lanacion.com.ar/sitemap-index-historico.xml";
/// Recent index; entries usually carry no month token.
const INDEX_RECENT: &str = "https://www.lanacion.com.ar/sitemap-index.xml";
/// Very recent news sitemap; itself a leaf urlset, not an index.
const SITEMAP_NEWS: &str = "https://www.lanacion.com.ar/sitemap-news.xml";

static MONTH_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})").unwrap());

/// First and last calendar day of a month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = (first + Months::new(1)).pred_opt()?;
    Some((first, last))
}

/// Whether a month overlaps the closed `[start, end]` window.
pub fn month_intersects(year: i32, month: u32, start: NaiveDate, end: NaiveDate) -> bool {
    match month_bounds(year, month) {
        Some((first, last)) => !(last < start || first > end),
        None => false,
    }
}

/// `<loc>` values inside `<sitemap>` blocks of an index document.
fn collect_locs(xml: &[u8], entry_tag: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut locs = Vec::new();
    let mut in_entry = false;
    let mut in_loc = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.name().as_ref() == entry_tag {
                    in_entry = true;
                } else if in_entry && e.name().as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t
                    .decode()
                    .map_err(|_| ())
                    .and_then(|d| quick_xml::escape::unescape(&d).map(|u| u.into_owned()).map_err(|_| ()))
                {
                    locs.push(text.trim().to_string());
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == entry_tag {
                    in_entry = false;
                } else if e.name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Sitemap index parse error; keeping entries read so far");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    locs
}

/// Parse a sitemap index document into its entries, attaching the year-month
/// token each entry URL embeds, if any.
pub fn index_entries(xml: &[u8]) -> Vec<SitemapRef> {
    collect_locs(xml, b"sitemap")
        .into_iter()
        .map(|loc| {
            let month = MONTH_TOKEN.captures(&loc).and_then(|caps| {
                let year = caps[1].parse::<i32>().ok()?;
                let month = caps[2].parse::<u32>().ok()?;
                Some((year, month))
            });
            SitemapRef { loc, month }
        })
        .collect()
}

/// Resolve every sitemap index into the list of leaf sitemaps to read.
///
/// Month-tagged entries outside `[start, end]` are dropped; the news sitemap
/// is appended as a leaf when it resolves at all. The result is deduplicated
/// preserving discovery order, then sorted. A failed index fetch skips that
/// index only.
pub async fn resolve_leaf_sitemaps(
    fetcher: &Fetcher,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<String> {
    let mut locs: Vec<String> = Vec::new();

    for index_url in [INDEX_HISTORICAL, INDEX_RECENT] {
        let Some(xml) = fetch_sitemap_doc(fetcher, index_url).await else {
            continue;
        };
        for entry in index_entries(&xml) {
            let keep = match entry.month {
                Some((year, month)) => month_intersects(year, month, start, end),
                None => true,
            };
            if keep {
                locs.push(entry.loc);
            }
        }
    }

    if fetch_sitemap_doc(fetcher, SITEMAP_NEWS).await.is_some() {
        locs.push(SITEMAP_NEWS.to_string());
    }

    let mut resolved: Vec<String> = locs.into_iter().unique().collect();
    resolved.sort();
    info!(count = resolved.len(), "Resolved leaf sitemaps");
    resolved
}

/// Fetch one sitemap document, transparently decompressing gzip payloads.
///
/// Returns `None` (with a warning) on fetch failure; the caller skips that
/// sitemap and keeps going.
pub async fn fetch_sitemap_doc(fetcher: &Fetcher, url: &str) -> Option<Vec<u8>> {
    match fetcher.get(url).await {
        Ok(page) => Some(gunzip_if_needed(&page, url)),
        Err(e) => {
            warn!(url, error = %e, "Sitemap fetch failed; skipping");
            None
        }
    }
}

/// Decompress when the content type, URL extension, or magic bytes say gzip.
/// A payload that fails to decompress is passed through as-is.
fn gunzip_if_needed(page: &FetchedPage, url: &str) -> Vec<u8> {
    if page.looks_gzipped() || url.ends_with(".gz") {
        let mut decoder = GzDecoder::new(&page.bytes[..]);
        let mut out = Vec::new();
        if decoder.read_to_end(&mut out).is_ok() {
            return out;
        }
        warn!(url, "Payload flagged as gzip but failed to decompress; using raw bytes");
    }
    page.bytes.clone()
}

/// `(url, lastmod)` pairs from a leaf sitemap.
///
/// `lastmod` comes from the generic `<lastmod>` tag, unless the entry carries
/// a news-specific `<news:publication_date>`, which takes precedence.
pub fn leaf_entries(xml: &[u8]) -> Vec<(String, Option<String>)> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut in_url = false;
    let mut field: Option<&'static str> = None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<String> = None;
    let mut news_date: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"url" => {
                    in_url = true;
                    loc = None;
                    lastmod = None;
                    news_date = None;
                }
                b"loc" if in_url => field = Some("loc"),
                b"lastmod" if in_url => field = Some("lastmod"),
                name if in_url && name.ends_with(b"publication_date") => field = Some("news_date"),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(which) = field {
                    let text = t
                        .decode()
                        .ok()
                        .and_then(|d| quick_xml::escape::unescape(&d).ok().map(|s| s.trim().to_string()))
                        .unwrap_or_default();
                    match which {
                        "loc" => loc = Some(text),
                        "lastmod" => lastmod = Some(text),
                        _ => news_date = Some(text),
                    }
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if e.name().as_ref() == b"url" {
                    in_url = false;
                    if let Some(url) = loc.take() {
                        entries.push((url, news_date.take().or(lastmod.take())));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Sitemap XML parse error; keeping entries read so far");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    entries
}

/// Turn leaf entries into candidates: drop URLs outside the site origin or
/// the section allow-list, and parse the lastmod hint when present.
pub fn candidates_from_leaf(
    entries: Vec<(String, Option<String>)>,
    sections: &[String],
) -> Vec<DiscoveryCandidate> {
    entries
        .into_iter()
        .filter(|(url, _)| url.starts_with(BASE))
        .filter(|(url, _)| matches_sections(url, sections))
        .map(|(url, lastmod)| DiscoveryCandidate {
            url,
            hint: lastmod.as_deref().and_then(parse_iso),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_window_pruning() {
        let start = date(2025, 2, 1);
        let end = date(2025, 2, 28);
        assert!(!month_intersects(2025, 1, start, end));
        assert!(month_intersects(2025, 2, start, end));
        assert!(!month_intersects(2025, 3, start, end));
        // window straddling a month boundary intersects both months
        assert!(month_intersects(2025, 1, date(2025, 1, 20), date(2025, 2, 5)));
    }

    #[test]
    fn month_bounds_handle_year_end() {
        assert_eq!(
            month_bounds(2024, 12),
            Some((date(2024, 12, 1), date(2024, 12, 31)))
        );
        assert_eq!(
            month_bounds(2024, 2),
            Some((date(2024, 2, 1), date(2024, 2, 29)))
        );
    }

    #[test]
    fn index_entries_attach_month_tokens() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>https://www.lanacion.com.ar/sitemap-2025-01.xml</loc></sitemap>
              <sitemap><loc>https://www.lanacion.com.ar/sitemap-reciente.xml</loc></sitemap>
            </sitemapindex>"#;
        let entries = index_entries(xml);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].month, Some((2025, 1)));
        assert_eq!(entries[1].month, None);
    }

    #[test]
    fn leaf_entries_read_loc_and_lastmod() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url>
                <loc>https://www.lanacion.com.ar/politica/nota-a-nid1/</loc>
                <lastmod>2025-02-10T08:15:00-03:00</lastmod>
              </url>
              <url>
                <loc>https://www.lanacion.com.ar/economia/nota-b-nid2/</loc>
              </url>
            </urlset>"#;
        let entries = leaf_entries(xml);
        assert_eq!(
            entries,
            vec![
                (
                    "https://www.lanacion.com.ar/politica/nota-a-nid1/".to_string(),
                    Some("2025-02-10T08:15:00-03:00".to_string())
                ),
                ("https://www.lanacion.com.ar/economia/nota-b-nid2/".to_string(), None),
            ]
        );
    }

    #[test]
    fn news_publication_date_takes_precedence() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                    xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
              <url>
                <loc>https://www.lanacion.com.ar/politica/nota-nid3/</loc>
                <lastmod>2025-02-01T00:00:00Z</lastmod>
                <news:news>
                  <news:publication_date>2025-02-11T10:00:00-03:00</news:publication_date>
                </news:news>
              </url>
            </urlset>"#;
        let entries = leaf_entries(xml);
        assert_eq!(entries[0].1, Some("2025-02-11T10:00:00-03:00".to_string()));
    }

    #[test]
    fn gzipped_leaf_is_decompressed() {
        let xml = br#"<urlset><url><loc>https://www.lanacion.com.ar/politica/n-nid4/</loc></url></urlset>"#;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml).unwrap();
        let compressed = encoder.finish().unwrap();

        let page = FetchedPage {
            status: 200,
            bytes: compressed,
            content_type: Some("application/xml".to_string()),
        };
        // magic-byte sniff, despite the innocent content type and extension
        let decoded = gunzip_if_needed(&page, "https://www.lanacion.com.ar/sitemap-x.xml");
        assert_eq!(leaf_entries(&decoded).len(), 1);
    }

    #[test]
    fn candidates_filtered_by_origin_and_section() {
        let entries = vec![
            (
                "https://www.lanacion.com.ar/politica/nota-nid1/".to_string(),
                Some("2025-02-10".to_string()),
            ),
            ("https://www.lanacion.com.ar/deportes/gol-nid2/".to_string(), None),
            ("https://otro-sitio.com/politica/nota/".to_string(), None),
        ];
        let candidates = candidates_from_leaf(entries, &["politica".to_string()]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://www.lanacion.com.ar/politica/nota-nid1/");
        assert_eq!(
            candidates[0].hint,
            date(2025, 2, 10).and_hms_opt(0, 0, 0)
        );
    }
}
