//! URL discovery strategies for finding candidate article URLs.
//!
//! Two interchangeable strategies share the contract "produce batches of
//! [`DiscoveryCandidate`](crate::models::DiscoveryCandidate), optionally
//! terminating early":
//!
//! | Strategy | Module | Source | Batch unit |
//! |----------|--------|--------|------------|
//! | Paginated listing scanner | [`listing`] | numeric listing pages | one page |
//! | Sitemap index resolver | [`sitemap`] | monthly + news sitemaps | one leaf sitemap |
//!
//! Both filter candidates against a section allow-list, matched on URL path
//! segments, before yielding them.

pub mod listing;
pub mod sitemap;

use url::Url;

/// Whether a candidate URL belongs to one of the wanted sections.
///
/// Matches `/{section}/` against the URL path, case-insensitively, so a
/// section name never matches inside an article slug.
pub fn matches_sections(url: &str, sections: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    sections
        .iter()
        .any(|section| path.contains(&format!("/{}/", section.to_lowercase())))
}
