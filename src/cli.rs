//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! One subcommand per discovery strategy:
//!
//! ```sh
//! # Scan numeric listing pages of one section
//! noticias_ingest listing --section politica --out noticias.csv
//!
//! # Ingest a date window via the sitemap indices
//! noticias_ingest sitemap --start 2025-01-01 --end 2025-04-30 \
//!     --sections politica economia --out noticias_2025q1.csv --with-text
//! ```

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the ingestion pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Scan paginated listing pages, newest first, until the cutoff date
    Listing(ListingArgs),
    /// Traverse sitemap indices for a date window
    Sitemap(SitemapArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListingArgs {
    /// Section whose listing pages to scan
    #[arg(long, default_value = "politica")]
    pub section: String,

    /// First listing page index (inclusive)
    #[arg(long, default_value_t = 300)]
    pub first_page: u32,

    /// Last listing page index (inclusive)
    #[arg(long, default_value_t = 1000)]
    pub last_page: u32,

    /// Stop once a page's newest article predates this date (YYYY-MM-DD)
    #[arg(long, default_value = "2025-01-01")]
    pub cutoff: NaiveDate,

    /// Corpus path; the extension selects the format (.csv or .jsonl)
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct SitemapArgs {
    /// Window start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Window end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Sections to include, matched on URL path segments
    #[arg(long, num_args = 1.., default_values_t = ["politica".to_string(), "economia".to_string()])]
    pub sections: Vec<String>,

    /// Corpus path; the extension selects the format (.csv or .jsonl)
    #[arg(short, long)]
    pub out: PathBuf,

    /// Include full article text (slower; aggregates body paragraphs)
    #[arg(long, default_value_t = false)]
    pub with_text: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_defaults() {
        let cli = Cli::parse_from([
            "noticias_ingest",
            "listing",
            "--out",
            "./noticias.csv",
        ]);
        let Mode::Listing(args) = cli.mode else {
            panic!("expected listing mode");
        };
        assert_eq!(args.section, "politica");
        assert_eq!(args.first_page, 300);
        assert_eq!(args.last_page, 1000);
        assert_eq!(args.cutoff, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(args.out, PathBuf::from("./noticias.csv"));
    }

    #[test]
    fn test_sitemap_parsing() {
        let cli = Cli::parse_from([
            "noticias_ingest",
            "sitemap",
            "--start",
            "2025-01-01",
            "--end",
            "2025-04-30",
            "--sections",
            "politica",
            "economia",
            "--out",
            "noticias_2025q1.csv",
            "--with-text",
        ]);
        let Mode::Sitemap(args) = cli.mode else {
            panic!("expected sitemap mode");
        };
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(args.end, NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());
        assert_eq!(args.sections, vec!["politica", "economia"]);
        assert!(args.with_text);
    }

    #[test]
    fn test_sitemap_default_sections() {
        let cli = Cli::parse_from([
            "noticias_ingest",
            "sitemap",
            "--start",
            "2025-02-01",
            "--end",
            "2025-02-28",
            "-o",
            "out.jsonl",
        ]);
        let Mode::Sitemap(args) = cli.mode else {
            panic!("expected sitemap mode");
        };
        assert_eq!(args.sections, vec!["politica", "economia"]);
        assert!(!args.with_text);
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let result = Cli::try_parse_from([
            "noticias_ingest",
            "sitemap",
            "--start",
            "not-a-date",
            "--end",
            "2025-02-28",
            "-o",
            "out.csv",
        ]);
        assert!(result.is_err());
    }
}
