//! Article field extraction via ordered fallback strategies.
//!
//! Each field has a fixed chain of named strategies tried in order; the first
//! one that produces text wins, and a missing field gets the
//! [`FIELD_MISSING`] sentinel instead of aborting the batch. Pages flagged as
//! live/ongoing events are excluded from the corpus entirely.
//!
//! The chains cover both site shapes this pipeline targets: headline/summary/
//! body classes and the localized date element on listing-site pages, and
//! JSON-LD / meta-tag metadata with the document-title fallback on the
//! sitemap site.

use crate::dates::{normalize_localized, parse_iso};
use crate::models::{ArticleRecord, DateValue, FIELD_MISSING};
use crate::utils::normalize_ws;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, trace};
use url::Url;

static LIVE_BADGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.news-headline-lbp__live-badge").unwrap());
static HEADLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.news-headline__title").unwrap());
static SUMMARY_HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.news-headline__article-summary").unwrap());
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static ARTICLE_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article.article-body").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static DOC_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_PUBLISHED: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"]"#).unwrap());
static PAGE_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.news-headline__publication-date").unwrap());
static LD_JSON: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

static TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*-\s*LA NACION\s*$").unwrap());
static URL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"-nid(\d+)").unwrap());

/// Paragraphs at or below this length are navigation/boilerplate, not prose.
const MIN_PARAGRAPH_CHARS: usize = 40;

/// What the extractor should spend effort on for this run mode.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Aggregate full article text. Skipping it avoids the paragraph sweep.
    pub with_body: bool,
    /// Pull the numeric identifier out of the URL (sitemap-site URLs only).
    pub with_id: bool,
}

/// Outcome of extracting one page.
#[derive(Debug)]
pub enum Extraction {
    /// Live/ongoing event page; excluded from the corpus, not a failure.
    Skip,
    Record(ArticleRecord),
}

type FieldStrategy = fn(&Html, &Url) -> Option<String>;

/// Try each named strategy in order; first success wins.
fn first_match(
    doc: &Html,
    url: &Url,
    field: &str,
    chain: &[(&str, FieldStrategy)],
) -> Option<String> {
    for (name, strategy) in chain {
        if let Some(value) = strategy(doc, url) {
            let value = normalize_ws(&value);
            if !value.is_empty() {
                trace!(field, strategy = name, "Field extracted");
                return Some(value);
            }
        }
    }
    debug!(field, %url, "No strategy matched; using sentinel");
    None
}

/// Parse one article page into a record, or skip it.
///
/// Never fails: fields that no strategy can produce get the sentinel, and a
/// date that resists normalization is carried as raw text.
pub fn extract(html: &str, url: &Url, opts: ExtractOptions) -> Extraction {
    let doc = Html::parse_document(html);

    if doc.select(&LIVE_BADGE).next().is_some() {
        debug!(%url, "Live event page; skipping entirely");
        return Extraction::Skip;
    }

    let title = first_match(
        &doc,
        url,
        "title",
        &[
            ("headline-class", title_from_headline),
            ("document-title", title_from_doc_title),
        ],
    )
    .unwrap_or_else(|| FIELD_MISSING.to_string());

    let summary = first_match(
        &doc,
        url,
        "summary",
        &[
            ("summary-heading", summary_from_heading),
            ("meta-description", summary_from_meta),
        ],
    )
    .unwrap_or_else(|| FIELD_MISSING.to_string());

    let body = if opts.with_body {
        first_match(
            &doc,
            url,
            "body",
            &[
                ("body-containers", body_from_containers),
                ("long-paragraphs", body_from_paragraphs),
            ],
        )
        .unwrap_or_else(|| FIELD_MISSING.to_string())
    } else {
        String::new()
    };

    let date = extract_date(&doc).unwrap_or_else(|| DateValue::Raw(FIELD_MISSING.to_string()));

    let section = jsonld_section(&doc)
        .or_else(|| section_from_path(url))
        .map(|s| normalize_ws(&s))
        .unwrap_or_else(|| FIELD_MISSING.to_string());

    let id = if opts.with_id { id_from_url(url.as_str()) } else { None };

    Extraction::Record(ArticleRecord {
        date,
        title,
        summary,
        body,
        url: url.to_string(),
        section,
        id,
        status: None,
    })
}

fn title_from_headline(doc: &Html, _url: &Url) -> Option<String> {
    doc.select(&HEADLINE)
        .next()
        .map(|el| el.text().collect::<String>())
}

fn title_from_doc_title(doc: &Html, _url: &Url) -> Option<String> {
    doc.select(&DOC_TITLE)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| TITLE_SUFFIX.replace(&t, "").into_owned())
}

fn summary_from_heading(doc: &Html, _url: &Url) -> Option<String> {
    doc.select(&SUMMARY_HEADING)
        .next()
        .map(|el| el.text().collect::<String>())
}

fn summary_from_meta(doc: &Html, _url: &Url) -> Option<String> {
    doc.select(&META_DESCRIPTION)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn body_from_containers(doc: &Html, _url: &Url) -> Option<String> {
    let parts: Vec<String> = doc
        .select(&ARTICLE_BODY)
        .map(|el| el.text().collect::<String>())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn body_from_paragraphs(doc: &Html, _url: &Url) -> Option<String> {
    let parts: Vec<String> = doc
        .select(&PARAGRAPH)
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|t| t.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Date chain: JSON-LD, then the published-time meta tag (both ISO), then the
/// localized on-page element. An ISO string that fails to parse falls through
/// to the next strategy; a localized string that fails to parse is kept raw.
fn extract_date(doc: &Html) -> Option<DateValue> {
    for iso in [jsonld_date(doc), meta_published(doc)].into_iter().flatten() {
        if let Some(ts) = parse_iso(&iso) {
            return Some(DateValue::Timestamp(ts));
        }
    }
    doc.select(&PAGE_DATE)
        .next()
        .map(|el| normalize_ws(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .map(|t| normalize_localized(&t))
}

fn meta_published(doc: &Html) -> Option<String> {
    doc.select(&META_PUBLISHED)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

/// Walk every JSON-LD block, tolerating object, array, and `@graph` shapes,
/// and yield the article nodes (`@type` of `NewsArticle` or `Article`).
fn jsonld_article_nodes(doc: &Html) -> Vec<serde_json::Value> {
    let mut nodes = Vec::new();
    for script in doc.select(&LD_JSON) {
        let text = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            continue;
        };
        let items: Vec<serde_json::Value> = match value {
            serde_json::Value::Array(arr) => arr,
            serde_json::Value::Object(mut obj) => match obj.remove("@graph") {
                Some(serde_json::Value::Array(graph)) => graph,
                _ => vec![serde_json::Value::Object(obj)],
            },
            _ => continue,
        };
        for item in items {
            let is_article = item
                .get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t == "NewsArticle" || t == "Article");
            if is_article {
                nodes.push(item);
            }
        }
    }
    nodes
}

fn jsonld_date(doc: &Html) -> Option<String> {
    jsonld_article_nodes(doc).iter().find_map(|node| {
        node.get("datePublished")
            .or_else(|| node.get("dateCreated"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

fn jsonld_section(doc: &Html) -> Option<String> {
    jsonld_article_nodes(doc).iter().find_map(|node| {
        node.get("articleSection")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    })
}

fn section_from_path(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// Numeric token embedded in the article URL, e.g. `...-nid07092025/`.
pub fn id_from_url(url: &str) -> Option<String> {
    URL_ID
        .captures(url)
        .map(|caps| caps[1].to_string())
}
