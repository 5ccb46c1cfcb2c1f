//! Listing-page scanning: locate product containers, assemble products.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::scraper::CrawlSession;
use crate::scraper::fields::{ProductDraft, extract_product};

/// Candidate container selectors, retailer-specific patterns first, generic
/// class-substring patterns last. The first selector that yields at least
/// one accepted product wins; trying further selectors would double-count
/// elements matched by several of the overlapping generic patterns.
const CONTAINER_SELECTORS: [&str; 15] = [
    // Technolife and lookalikes
    "[data-product-id]",
    ".product-box",
    ".product-item-container",
    ".product-list-item",
    ".product-card-container",
    // Digikala
    "[data-testid=\"product-card\"]",
    ".product-list_ProductList__item__LiiNI",
    // Generic
    ".product-item",
    ".product-card",
    ".product",
    ".item-product",
    ".product-container",
    ".listing-item",
    "[class*=\"product\"]",
    "[class*=\"item\"]",
];

/// Scan one fetched listing page for up to `budget` products.
///
/// Candidates are processed in document order and checked against the
/// session's de-duplication sets; rejected candidates (bad name/price,
/// duplicates) are dropped silently.
pub fn scan_listing(
    html: &str,
    page_url: &Url,
    budget: usize,
    session: &mut CrawlSession,
) -> Vec<ProductDraft> {
    if budget == 0 {
        return Vec::new();
    }

    let doc = Html::parse_document(html);
    let page = doc.root_element();

    for sel_str in CONTAINER_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };

        let mut accepted = Vec::new();
        for el in doc.select(&sel) {
            if accepted.len() >= budget {
                break;
            }
            let Some(draft) = extract_product(el, page, page_url) else {
                continue;
            };
            if !session.admit(&draft.product) {
                continue;
            }
            accepted.push(draft);
        }

        if !accepted.is_empty() {
            debug!(
                selector = sel_str,
                count = accepted.len(),
                "containers matched"
            );
            return accepted;
        }
    }

    Vec::new()
}
