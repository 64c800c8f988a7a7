//! Paginated listing scanner.
//!
//! Iterates numeric listing pages of one section (newest first) and pulls one
//! candidate URL out of each repeated article block. Candidates carry no hint
//! timestamp; the publication date only becomes known after the article page
//! itself is parsed.

use crate::discovery::matches_sections;
use crate::models::DiscoveryCandidate;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

pub const BASE: &str = "https://www.ambito.com";

static ARTICLE_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("article.news-article").unwrap());
static BLOCK_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// URL of one numeric listing page for a section.
pub fn page_url(section: &str, page: u32) -> String {
    format!("{BASE}/{section}/{page}")
}

/// Candidate URLs from one listing page, in page order.
///
/// Takes the first anchor of each article block, resolved against the page
/// URL, then applies the section allow-list.
pub fn candidates_from_page(
    html: &str,
    page_url: &Url,
    sections: &[String],
) -> Vec<DiscoveryCandidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();
    for block in document.select(&ARTICLE_BLOCK) {
        let Some(anchor) = block.select(&BLOCK_ANCHOR).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = page_url.join(href) else {
            debug!(href, "Unresolvable listing href; skipping");
            continue;
        };
        let url = resolved.to_string();
        if matches_sections(&url, sections) {
            candidates.push(DiscoveryCandidate { url, hint: None });
        }
    }
    info!(
        count = candidates.len(),
        page = %page_url,
        "Indexed listing candidates"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_candidate_per_article_block() {
        let html = r#"<html><body>
            <article class="news-article">
                <a href="https://www.ambito.com/politica/primera-nota-n100">x</a>
                <a href="https://www.ambito.com/politica/enlace-secundario-n101">y</a>
            </article>
            <article class="news-article">
                <a href="/politica/segunda-nota-n102">z</a>
            </article>
            <article class="otra-cosa">
                <a href="https://www.ambito.com/politica/no-es-bloque-n103">w</a>
            </article>
        </body></html>"#;

        let page = Url::parse(&page_url("politica", 300)).unwrap();
        let candidates =
            candidates_from_page(html, &page, &["politica".to_string()]);
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.ambito.com/politica/primera-nota-n100",
                "https://www.ambito.com/politica/segunda-nota-n102",
            ]
        );
        assert!(candidates.iter().all(|c| c.hint.is_none()));
    }

    #[test]
    fn other_sections_are_filtered_out() {
        let html = r#"<html><body>
            <article class="news-article">
                <a href="https://www.ambito.com/deportes/gol-n1">x</a>
            </article>
        </body></html>"#;
        let page = Url::parse(&page_url("politica", 300)).unwrap();
        assert!(candidates_from_page(html, &page, &["politica".to_string()]).is_empty());
    }

    #[test]
    fn page_url_shape() {
        assert_eq!(page_url("economia", 42), "https://www.ambito.com/economia/42");
    }
}
