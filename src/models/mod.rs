use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest name we keep for a scraped product.
pub const MAX_NAME_LEN: usize = 200;
/// Names at or under this length are noise matches and get dropped.
pub const MIN_NAME_LEN: usize = 5;
/// Minimum plausible price in Toman. Filters out star ratings, quantities
/// and similar numbers that leak through broad selectors.
pub const MIN_PLAUSIBLE_PRICE: u64 = 1000;

// ── Scraped product ───────────────────────────────────────────────────────────

/// One product lifted off a listing page. Ephemeral: not tied to any store
/// until the pipeline persists it as an offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedProduct {
    pub name: String,
    /// Canonical Toman amount, always above `MIN_PLAUSIBLE_PRICE`.
    pub price: u64,
    /// Pre-discount price, when the listing shows one.
    pub original_price: Option<u64>,
    /// Absolute image URL.
    pub image: Option<String>,
    /// Absolute product URL; falls back to the listing page URL.
    pub url: String,
    pub specs: BTreeMap<String, String>,
}

impl ScrapedProduct {
    /// Acceptance rule for a candidate: too-short names and implausible
    /// prices are selector noise, not products.
    pub fn is_plausible(&self) -> bool {
        self.name.chars().count() > MIN_NAME_LEN && self.price > MIN_PLAUSIBLE_PRICE
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    /// Listing-page seed URLs configured for this store. Stored as JSON in
    /// DuckDB; decoded at the repository boundary so nothing downstream ever
    /// sees the encoded text.
    pub product_urls: Vec<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

// ── Crawl report ──────────────────────────────────────────────────────────────

/// Saved-product line item for the report sample.
#[derive(Debug, Clone, Serialize)]
pub struct SavedOffer {
    pub product: String,
    pub price: u64,
    pub store: String,
    pub spec_count: usize,
}

/// Outcome of a full store crawl. Always produced, even when most seeds
/// failed: partial data plus aggregate counts.
#[derive(Debug, Serialize)]
pub struct ScrapeReport {
    pub message: String,
    pub total_found: usize,
    pub total_saved: usize,
    pub total_specs: usize,
    pub urls_scraped: usize,
    /// First few saved products, for display.
    pub sample: Vec<SavedOffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, price: u64) -> ScrapedProduct {
        ScrapedProduct {
            name: name.to_string(),
            price,
            original_price: None,
            image: None,
            url: "https://example.ir/p/1".to_string(),
            specs: BTreeMap::new(),
        }
    }

    #[test]
    fn plausibility_floor() {
        assert!(product("Apple iPhone 15", 32_500_000).is_plausible());
        assert!(!product("short", 32_500_000).is_plausible());
        assert!(!product("Apple iPhone 15", 1000).is_plausible());
        assert!(!product("Apple iPhone 15", 0).is_plausible());
    }
}
