//! Pipeline controller: discovery → dedup → fetch → extract → date filter →
//! persist, one discovery batch at a time.
//!
//! Batches are processed strictly sequentially because both the dedup set and
//! the listing-mode early-stop decision depend on the fully completed results
//! of the prior batch. Within a batch, fetch+extract for each candidate runs
//! concurrently under the configured cap, and the batch completes only once
//! every request has resolved.
//!
//! The listing-mode termination policy assumes strictly reverse-chronological
//! listings; if the origin back-fills older items onto a newer page the run
//! silently under-collects. Known limitation.

use crate::discovery::{listing, sitemap};
use crate::extract::{extract, ExtractOptions, Extraction};
use crate::fetch::Fetcher;
use crate::models::{ArticleRecord, DiscoveryCandidate, RunOutcome};
use crate::store::CorpusStore;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use url::Url;

/// Parameters for a paginated listing run.
#[derive(Debug)]
pub struct ListingRun {
    pub section: String,
    pub first_page: u32,
    pub last_page: u32,
    /// Stop scanning once a batch's first record predates this.
    pub cutoff: NaiveDate,
    pub out: PathBuf,
}

/// Parameters for a sitemap-range run.
#[derive(Debug)]
pub struct SitemapRun {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub sections: Vec<String>,
    pub out: PathBuf,
    pub with_text: bool,
}

/// Scan numeric listing pages in order, ingesting new articles until the
/// range is exhausted or a batch reaches back past the cutoff date.
#[instrument(level = "info", skip_all, fields(section = %run.section))]
pub async fn run_listing(fetcher: &Fetcher, run: &ListingRun) -> Result<RunOutcome, Box<dyn Error>> {
    let mut store = CorpusStore::open(&run.out)?;
    let mut seen = store.load_seen_urls()?;
    let sections = vec![run.section.clone()];
    let opts = ExtractOptions { with_body: true, with_id: false };

    let mut discovered = 0usize;
    let mut appended = 0usize;

    for page in run.first_page..=run.last_page {
        let page_url = listing::page_url(&run.section, page);
        let listing_html = match fetcher.get(&page_url).await {
            Ok(page) => page.text().into_owned(),
            Err(e) => {
                warn!(url = %page_url, error = %e, "Listing page fetch failed; skipping page");
                continue;
            }
        };
        let base = Url::parse(&page_url)?;
        let candidates = listing::candidates_from_page(&listing_html, &base, &sections);
        discovered += candidates.len();

        let fresh = claim_fresh(candidates, &mut seen);
        if fresh.is_empty() {
            info!(page, "No new candidates on page");
            continue;
        }

        let records = fetch_and_extract_batch(fetcher, fresh, opts, None).await;
        if records.is_empty() {
            info!(page, "No records survived extraction");
            continue;
        }

        store.append(&records)?;
        appended += records.len();
        info!(
            page,
            new = records.len(),
            total = appended,
            first_date = ?records[0].date,
            "Persisted listing batch"
        );

        if listing_should_stop(&records, run.cutoff) {
            info!(page, cutoff = %run.cutoff, "Batch predates cutoff; stopping discovery");
            break;
        }
    }

    Ok(classify(discovered, appended))
}

/// Resolve the sitemap indices for the requested window and ingest every
/// matching article, exhaustively over all leaf sitemaps.
#[instrument(level = "info", skip_all, fields(start = %run.start, end = %run.end))]
pub async fn run_sitemap(fetcher: &Fetcher, run: &SitemapRun) -> Result<RunOutcome, Box<dyn Error>> {
    let mut store = CorpusStore::open(&run.out)?;
    let mut seen = store.load_seen_urls()?;
    let opts = ExtractOptions { with_body: run.with_text, with_id: true };

    let leaves = sitemap::resolve_leaf_sitemaps(fetcher, run.start, run.end).await;
    if leaves.is_empty() {
        warn!("No sitemaps resolved for the requested window");
        return Ok(RunOutcome::NoCandidates);
    }

    let mut discovered = 0usize;
    let mut appended = 0usize;

    for leaf in &leaves {
        info!(sitemap = %leaf, "Reading sitemap");
        let Some(xml) = sitemap::fetch_sitemap_doc(fetcher, leaf).await else {
            continue;
        };
        let candidates = sitemap::candidates_from_leaf(sitemap::leaf_entries(&xml), &run.sections);
        discovered += candidates.len();

        let fresh = claim_fresh(candidates, &mut seen);
        if fresh.is_empty() {
            continue;
        }

        let mut records = fetch_and_extract_batch(fetcher, fresh, opts, Some(200)).await;
        // lastmod hints are unreliable; only the extracted date decides.
        records.retain(|r| in_window(r, run.start, run.end));
        if records.is_empty() {
            continue;
        }

        store.append(&records)?;
        appended += records.len();
        info!(sitemap = %leaf, new = records.len(), total = appended, "Persisted sitemap batch");
    }

    Ok(classify(discovered, appended))
}

/// Drop candidates already claimed and claim the rest, so a URL appearing in
/// several sitemaps within one run is fetched at most once.
fn claim_fresh(
    candidates: Vec<DiscoveryCandidate>,
    seen: &mut HashSet<String>,
) -> Vec<DiscoveryCandidate> {
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// Listings are newest-first: once the head of a persisted batch predates the
/// cutoff, older pages have nothing left for us. A raw (unparsed) date never
/// stops the scan.
fn listing_should_stop(batch: &[ArticleRecord], cutoff: NaiveDate) -> bool {
    batch
        .first()
        .and_then(|r| r.date.timestamp())
        .is_some_and(|ts| ts.date() < cutoff)
}

fn in_window(record: &ArticleRecord, start: NaiveDate, end: NaiveDate) -> bool {
    match record.date.timestamp() {
        Some(ts) => {
            let d = ts.date();
            start <= d && d <= end
        }
        None => false,
    }
}

/// Fan out fetch+extract over one batch and collect the surviving records in
/// candidate order. Failed fetches and live-event pages drop out silently.
async fn fetch_and_extract_batch(
    fetcher: &Fetcher,
    candidates: Vec<DiscoveryCandidate>,
    opts: ExtractOptions,
    status_tag: Option<u16>,
) -> Vec<ArticleRecord> {
    let cap = fetcher.config().max_concurrency;
    stream::iter(candidates)
        .map(|candidate| async move {
            let url = match Url::parse(&candidate.url) {
                Ok(u) => u,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Bad candidate URL; skipping");
                    return None;
                }
            };
            let page = match fetcher.get(candidate.url.as_str()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Article fetch failed; skipping");
                    return None;
                }
            };
            match extract(&page.text(), &url, opts) {
                Extraction::Skip => None,
                Extraction::Record(mut record) => {
                    record.status = status_tag;
                    Some(record)
                }
            }
        })
        .buffered(cap)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect()
}

fn classify(discovered: usize, appended: usize) -> RunOutcome {
    if discovered == 0 {
        RunOutcome::NoCandidates
    } else if appended == 0 {
        RunOutcome::NoMatches
    } else {
        RunOutcome::Ingested(appended)
    }
}
