pub mod fields;
pub mod http_client;
pub mod listing;
pub mod price;
pub mod specs;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::models::ScrapedProduct;
use crate::scraper::listing::scan_listing;

// ── Fetcher trait ─────────────────────────────────────────────────────────────

/// Swappable page-fetching abstraction. The crawl loop only ever needs page
/// bodies, so tests script this instead of standing up a server.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a listing page (the longer timeout).
    async fn fetch_listing(&self, url: &str) -> Result<String>;
    /// Fetch a product detail page (the shorter timeout).
    async fn fetch_detail(&self, url: &str) -> Result<String>;
}

// ── Crawl session ─────────────────────────────────────────────────────────────

/// Accumulated state of one crawl invocation: de-duplication sets shared
/// across pages and seed URLs, plus a fetch counter for logging. Mutated
/// only from the single sequential control flow; no locking needed.
#[derive(Debug, Default)]
pub struct CrawlSession {
    seen_names: HashSet<String>,
    seen_urls: HashSet<String>,
    pages_fetched: usize,
}

impl CrawlSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a product into the session unless its name or URL was already
    /// seen. Admission records both keys.
    pub fn admit(&mut self, product: &ScrapedProduct) -> bool {
        if self.seen_names.contains(&product.name) || self.seen_urls.contains(&product.url) {
            return false;
        }
        self.seen_names.insert(product.name.clone());
        self.seen_urls.insert(product.url.clone());
        true
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

// ── Next-page discovery ───────────────────────────────────────────────────────

const NEXT_LINK_SELECTORS: [&str; 5] = [
    "a[rel=\"next\"]",
    ".pagination a.next",
    "a.next-page",
    "li.next a",
    "a[class*=\"next\"]",
];

/// Anchor text marking the "next page" control on Persian sites.
const NEXT_LINK_TEXTS: [&str; 2] = ["بعدی", "صفحه بعد"];

/// Find the next listing page: an explicit next-link if the markup has one,
/// otherwise a synthesized URL with the page query parameter bumped.
fn next_page_url(html: &str, current: &Url) -> Url {
    let doc = Html::parse_document(html);

    for sel_str in NEXT_LINK_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(href) = doc.select(&sel).next().and_then(|a| a.attr("href")) {
            if let Ok(mut next) = current.join(href.trim()) {
                next.set_fragment(None);
                return next;
            }
        }
    }

    if let Ok(a_sel) = Selector::parse("a[href]") {
        for a in doc.select(&a_sel) {
            let text: String = a.text().collect();
            if NEXT_LINK_TEXTS.iter().any(|t| text.contains(t)) {
                if let Some(href) = a.attr("href") {
                    if let Ok(mut next) = current.join(href.trim()) {
                        next.set_fragment(None);
                        return next;
                    }
                }
            }
        }
    }

    synthesize_next(current)
}

/// Bump the `page`/`p` query parameter, treating a missing parameter as
/// page 1.
fn synthesize_next(current: &Url) -> Url {
    let mut pairs: Vec<(String, String)> = current
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut bumped = false;
    for (key, value) in pairs.iter_mut() {
        if key == "page" || key == "p" {
            let n: u64 = value.parse().unwrap_or(1);
            *value = (n + 1).to_string();
            bumped = true;
            break;
        }
    }
    if !bumped {
        pairs.push(("page".to_string(), "2".to_string()));
    }

    let mut next = current.clone();
    next.set_fragment(None);
    next.query_pairs_mut()
        .clear()
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    next
}

// ── Crawler ───────────────────────────────────────────────────────────────────

/// Pagination-following crawler: the top-level entry point of the scraping
/// pipeline. Fetches are strictly sequential within a session — a
/// politeness and simplicity trade-off, and each page's URL may depend on
/// the previous page's content anyway.
pub struct Crawler<F> {
    fetcher: F,
    max_pages_per_seed: usize,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, config: &CrawlConfig) -> Self {
        Self {
            fetcher,
            max_pages_per_seed: config.max_pages_per_seed,
        }
    }

    /// Crawl every seed URL of a store, splitting `global_max` evenly across
    /// seeds (at least 1 each). A dead seed is logged and skipped; it never
    /// aborts its siblings.
    pub async fn crawl_store(
        &self,
        seeds: &[String],
        global_max: usize,
    ) -> Vec<ScrapedProduct> {
        if seeds.is_empty() || global_max == 0 {
            return Vec::new();
        }

        let per_seed = (global_max / seeds.len()).max(1);
        let mut session = CrawlSession::new();
        let mut products = Vec::new();

        for seed in seeds {
            if products.len() >= global_max {
                break;
            }
            let quota = per_seed.min(global_max - products.len());
            let found = self.crawl_seed(seed, quota, &mut session).await;
            info!("{}: {} products", seed, found.len());
            products.extend(found);
        }

        info!(
            "store crawl done: {} products over {} page fetches",
            products.len(),
            session.pages_fetched()
        );
        products
    }

    /// Ad-hoc crawl of a single seed URL with a fresh session.
    pub async fn crawl(&self, seed: &str, max_products: usize) -> Vec<ScrapedProduct> {
        let mut session = CrawlSession::new();
        self.crawl_seed(seed, max_products, &mut session).await
    }

    async fn crawl_seed(
        &self,
        seed: &str,
        max_products: usize,
        session: &mut CrawlSession,
    ) -> Vec<ScrapedProduct> {
        let mut current = match Url::parse(seed) {
            Ok(url) => url,
            Err(e) => {
                warn!("skipping unparseable seed URL {}: {}", seed, e);
                return Vec::new();
            }
        };

        let mut found: Vec<ScrapedProduct> = Vec::new();

        for page_no in 1..=self.max_pages_per_seed {
            let html = match self.fetcher.fetch_listing(current.as_str()).await {
                Ok(html) => {
                    session.pages_fetched += 1;
                    html
                }
                Err(e) => {
                    warn!("fetch failed for {}: {:#}", current, e);
                    break;
                }
            };

            let drafts = scan_listing(&html, &current, max_products - found.len(), session);
            if drafts.is_empty() {
                // End of content, or none of the container selectors match
                // this site. Retrying further pages won't change that.
                debug!("page {} of {} yielded nothing, stopping", page_no, seed);
                break;
            }

            for draft in drafts {
                let mut product = draft.product;
                if draft.wants_detail_specs {
                    if let Some(specs) = self.detail_specs(&product.url).await {
                        product.specs = specs;
                    }
                }
                found.push(product);
            }

            if found.len() >= max_products {
                break;
            }

            let next = next_page_url(&html, &current);
            if next == current {
                debug!("next page resolves to the current URL, stopping");
                break;
            }
            current = next;
        }

        found
    }

    /// Secondary fetch for retailers that keep specs on the detail page.
    /// Any failure falls back to whatever the listing element offered.
    async fn detail_specs(
        &self,
        url: &str,
    ) -> Option<std::collections::BTreeMap<String, String>> {
        match self.fetcher.fetch_detail(url).await {
            Ok(html) => {
                let specs = specs::extract_specs_from_page(&Html::parse_document(&html));
                (!specs.is_empty()).then_some(specs)
            }
            Err(e) => {
                debug!("detail fetch failed for {}, keeping listing specs: {:#}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted fetcher: maps exact URLs to page bodies or failures, and
    /// records every listing fetch.
    #[derive(Default)]
    struct ScriptedFetcher {
        pages: HashMap<String, Option<String>>,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), Some(body.to_string()));
            self
        }

        fn broken(mut self, url: &str) -> Self {
            self.pages.insert(url.to_string(), None);
            self
        }

        fn fetches(&self) -> usize {
            self.log.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_listing(&self, url: &str) -> Result<String> {
            self.log.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Some(body)) => Ok(body.clone()),
                Some(None) => anyhow::bail!("connection reset"),
                None => anyhow::bail!("404 for {}", url),
            }
        }

        async fn fetch_detail(&self, url: &str) -> Result<String> {
            match self.pages.get(url) {
                Some(Some(body)) => Ok(body.clone()),
                _ => anyhow::bail!("detail fetch failed"),
            }
        }
    }

    fn card(name: &str, slug: &str, price: &str) -> String {
        format!(
            r#"<div class="product-item">
                <h3>{name}</h3>
                <span class="price">{price}</span>
                <a href="/p/{slug}">view</a>
            </div>"#
        )
    }

    fn crawler(fetcher: ScriptedFetcher) -> Crawler<ScriptedFetcher> {
        let config = CrawlConfig {
            store_max_products: 10,
            adhoc_max_products: 20,
            max_pages_per_seed: 5,
        };
        Crawler::new(fetcher, &config)
    }

    #[test]
    fn synthesized_next_starts_at_page_two() {
        let url = Url::parse("https://shop.ir/phones").unwrap();
        assert_eq!(synthesize_next(&url).as_str(), "https://shop.ir/phones?page=2");
    }

    #[test]
    fn synthesized_next_increments_existing_parameter() {
        let url = Url::parse("https://shop.ir/phones?sort=new&page=3").unwrap();
        assert_eq!(
            synthesize_next(&url).as_str(),
            "https://shop.ir/phones?sort=new&page=4"
        );
        let url = Url::parse("https://shop.ir/list?p=7").unwrap();
        assert_eq!(synthesize_next(&url).as_str(), "https://shop.ir/list?p=8");
    }

    #[test]
    fn explicit_next_link_preferred_over_synthesis() {
        let url = Url::parse("https://shop.ir/phones").unwrap();
        let html = r#"<a rel="next" href="/phones?cursor=abc">بعدی</a>"#;
        assert_eq!(
            next_page_url(html, &url).as_str(),
            "https://shop.ir/phones?cursor=abc"
        );
    }

    #[test]
    fn persian_next_text_discovered() {
        let url = Url::parse("https://shop.ir/phones").unwrap();
        let html = r#"<a href="/phones/page/2">صفحه بعد</a>"#;
        assert_eq!(
            next_page_url(html, &url).as_str(),
            "https://shop.ir/phones/page/2"
        );
    }

    #[tokio::test]
    async fn page_ceiling_bounds_a_seed() {
        // Every page yields a fresh product and pagination never ends.
        let mut fetcher = ScriptedFetcher::default();
        fetcher = fetcher.page("https://shop.ir/all", &card("Handset Alpha One 128GB", "a1", "5,000,000"));
        for n in 2..=10 {
            fetcher = fetcher.page(
                &format!("https://shop.ir/all?page={}", n),
                &card(&format!("Handset Number {} 128GB", n), &format!("p{}", n), "5,000,000"),
            );
        }

        let crawler = crawler(fetcher);
        let products = crawler.crawl("https://shop.ir/all", 50).await;
        assert_eq!(crawler.fetcher.fetches(), 5, "hard page ceiling");
        assert_eq!(products.len(), 5);
    }

    #[tokio::test]
    async fn budget_respected() {
        let listing = format!(
            "{}{}{}",
            card("Apple iPhone 15 128GB", "i15", "32,500,000"),
            card("Samsung Galaxy S24 256GB", "s24", "28,500,000"),
            card("Xiaomi Redmi Note 13 Pro", "r13", "12,000,000"),
        );
        let fetcher = ScriptedFetcher::default().page("https://shop.ir/all", &listing);

        let crawler = crawler(fetcher);
        let products = crawler.crawl("https://shop.ir/all", 2).await;
        assert_eq!(products.len(), 2);
        // Budget hit on page one: no second fetch.
        assert_eq!(crawler.fetcher.fetches(), 1);
    }

    #[tokio::test]
    async fn repeated_content_stops_the_seed() {
        // Page 2 serves the same products; dedup leaves zero new ones and
        // the crawl stops instead of walking all five pages.
        let listing = card("Apple iPhone 15 128GB", "i15", "32,500,000");
        let fetcher = ScriptedFetcher::default()
            .page("https://shop.ir/all", &listing)
            .page("https://shop.ir/all?page=2", &listing)
            .page("https://shop.ir/all?page=3", &listing);

        let crawler = crawler(fetcher);
        let products = crawler.crawl("https://shop.ir/all", 10).await;
        assert_eq!(products.len(), 1);
        assert_eq!(crawler.fetcher.fetches(), 2);
    }

    #[tokio::test]
    async fn partial_failure_tolerated_across_seeds() {
        let fetcher = ScriptedFetcher::default()
            .page("https://shop.ir/a", &card("Apple iPhone 15 128GB", "i15", "32,500,000"))
            .broken("https://shop.ir/b")
            .page("https://shop.ir/c", &card("Samsung Galaxy S24 256GB", "s24", "28,500,000"));

        let seeds = vec![
            "https://shop.ir/a".to_string(),
            "https://shop.ir/b".to_string(),
            "https://shop.ir/c".to_string(),
        ];
        let products = crawler(fetcher).crawl_store(&seeds, 9).await;
        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Apple iPhone 15 128GB", "Samsung Galaxy S24 256GB"]
        );
    }

    #[tokio::test]
    async fn store_crawl_deduplicates_across_seeds() {
        // Both seeds list the same product.
        let listing = card("Apple iPhone 15 128GB", "i15", "32,500,000");
        let fetcher = ScriptedFetcher::default()
            .page("https://shop.ir/a", &listing)
            .page("https://shop.ir/b", &listing);

        let seeds = vec!["https://shop.ir/a".to_string(), "https://shop.ir/b".to_string()];
        let products = crawler(fetcher).crawl_store(&seeds, 10).await;
        assert_eq!(products.len(), 1);
    }

    #[tokio::test]
    async fn global_cap_never_exceeded() {
        let mut listing_a = String::new();
        let mut listing_b = String::new();
        for n in 0..6 {
            listing_a.push_str(&card(
                &format!("Handset Alpha Model {} 64GB", n),
                &format!("a{}", n),
                "5,000,000",
            ));
            listing_b.push_str(&card(
                &format!("Handset Beta Model {} 64GB", n),
                &format!("b{}", n),
                "6,000,000",
            ));
        }
        let fetcher = ScriptedFetcher::default()
            .page("https://shop.ir/a", &listing_a)
            .page("https://shop.ir/b", &listing_b);

        let seeds = vec!["https://shop.ir/a".to_string(), "https://shop.ir/b".to_string()];
        let products = crawler(fetcher).crawl_store(&seeds, 4).await;
        assert_eq!(products.len(), 4, "even split, two per seed");
    }

    #[tokio::test]
    async fn detail_page_specs_replace_listing_specs() {
        let listing = r#"
            <div class="product-item">
                <h3>Nokia 3310 Classic Edition</h3>
                <span class="price">2,500,000</span>
                <a href="https://mobile140.com/p/nokia"></a>
            </div>
        "#;
        let detail = r#"<table><tr><td>باتری</td><td>1200 میلی‌آمپر</td></tr></table>"#;
        let fetcher = ScriptedFetcher::default()
            .page("https://shop.ir/all", listing)
            .page("https://mobile140.com/p/nokia", detail);

        let products = crawler(fetcher).crawl("https://shop.ir/all", 5).await;
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0].specs.get("باتری").map(String::as_str),
            Some("1200 میلی‌آمپر")
        );
    }

    #[tokio::test]
    async fn failed_detail_fetch_keeps_listing_specs() {
        let listing = r#"
            <div class="product-item">
                <h3>Nokia 3310 Classic Edition</h3>
                <span class="price">2,500,000</span>
                <a href="https://mobile140.com/p/nokia"></a>
                <ul><li>وزن: 133 گرم</li></ul>
            </div>
        "#;
        let fetcher = ScriptedFetcher::default().page("https://shop.ir/all", listing);

        let products = crawler(fetcher).crawl("https://shop.ir/all", 5).await;
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0].specs.get("وزن").map(String::as_str),
            Some("133 گرم")
        );
    }

    #[test]
    fn blocking_adhoc_crawl_with_unparseable_seed() {
        let products = tokio_test::block_on(crawler(ScriptedFetcher::default()).crawl("not a url", 5));
        assert!(products.is_empty());
    }
}
