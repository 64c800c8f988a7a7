//! # Noticias Ingest
//!
//! An incremental ingestion pipeline for Argentine news sites. Candidate
//! article URLs are discovered either by scanning paginated listing pages or
//! by traversing sitemap indices, deduplicated against the persisted corpus,
//! fetched politely, parsed with layered fallback extraction, and appended to
//! a tabular corpus file with a backup of the prior state.
//!
//! ## Usage
//!
//! ```sh
//! noticias_ingest listing --section politica --out noticias.csv
//! noticias_ingest sitemap --start 2025-01-01 --end 2025-04-30 \
//!     --sections politica economia --out noticias_2025q1.csv --with-text
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs one discovery batch at a time:
//! 1. **Discovery**: one listing page, or one leaf sitemap, yields candidates
//! 2. **Dedup**: URLs already in the corpus are dropped before any fetch
//! 3. **Fetch + extract**: the batch fans out concurrently, then joins
//! 4. **Persist**: surviving records are appended; the corpus is backed up
//!    once per run before the first append
//!
//! ## Exit codes
//!
//! - `0`: articles ingested
//! - `2`: discovery produced no candidates at all
//! - `3`: candidates existed but none matched the filters

use clap::Parser;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod dates;
mod discovery;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod store;
mod utils;

use cli::{Cli, Mode};
use fetch::{Fetcher, RequestConfig};
use models::RunOutcome;
use pipeline::{ListingRun, SitemapRun};
use utils::ensure_writable_parent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("noticias_ingest starting up");

    let args = Cli::parse();
    let fetcher = Fetcher::new(RequestConfig::default())?;

    let outcome = match &args.mode {
        Mode::Listing(listing) => {
            if let Err(e) = ensure_writable_parent(&listing.out).await {
                error!(path = %listing.out.display(), error = %e, "Output location is not writable");
                return Err(e);
            }
            let run = ListingRun {
                section: listing.section.clone(),
                first_page: listing.first_page,
                last_page: listing.last_page,
                cutoff: listing.cutoff,
                out: listing.out.clone(),
            };
            pipeline::run_listing(&fetcher, &run).await?
        }
        Mode::Sitemap(sitemap) => {
            if sitemap.end < sitemap.start {
                error!(start = %sitemap.start, end = %sitemap.end, "End date precedes start date");
                std::process::exit(2);
            }
            if let Err(e) = ensure_writable_parent(&sitemap.out).await {
                error!(path = %sitemap.out.display(), error = %e, "Output location is not writable");
                return Err(e);
            }
            let run = SitemapRun {
                start: sitemap.start,
                end: sitemap.end,
                sections: sitemap.sections.clone(),
                out: sitemap.out.clone(),
                with_text: sitemap.with_text,
            };
            pipeline::run_sitemap(&fetcher, &run).await?
        }
    };

    let elapsed = start_time.elapsed();
    match outcome {
        RunOutcome::Ingested(count) => {
            info!(count, ?elapsed, "Execution complete");
            Ok(())
        }
        RunOutcome::NoCandidates => {
            error!(?elapsed, "No discovery sources resolved / no candidates found");
            std::process::exit(outcome.exit_code());
        }
        RunOutcome::NoMatches => {
            error!(?elapsed, "Candidates found but none matched the requested filters");
            std::process::exit(outcome.exit_code());
        }
    }
}
