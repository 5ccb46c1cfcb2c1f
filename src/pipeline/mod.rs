//! Pipeline orchestrator: ties crawler → storage together.
//!
//! `scrape_store()` resolves a store's configured seed URLs, runs the
//! store-level crawl, then persists every plausible product: find-or-create
//! the catalog entry (name-prefix containment, so retitled listings reuse
//! the same product) and upsert the (product, store) offer. One product
//! failing to save never aborts the rest; the report always comes back with
//! whatever partial data was obtainable.

use anyhow::{Context, Result};
use tracing::{info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::error::ScrapeError;
use crate::models::{SavedOffer, ScrapeReport, ScrapedProduct, Store};
use crate::scraper::Crawler;
use crate::scraper::http_client::HttpClient;
use crate::storage::Repository;

/// Prefix length used for catalog product identity matching.
const NAME_MATCH_PREFIX: usize = 50;

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Crawl every configured listing URL of a store and persist the
    /// results as offers.
    pub async fn scrape_store(&self, store_id: i64) -> Result<ScrapeReport, ScrapeError> {
        let repo = Repository::open(&self.config.storage.db_path)
            .context("Failed to open database")?;
        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let store = repo
            .find_store(store_id)?
            .ok_or(ScrapeError::StoreNotFound(store_id))?;
        if store.product_urls.is_empty() {
            return Err(ScrapeError::NoSeedUrls(store_id));
        }

        info!(
            "=== Crawling {} ({} seed URLs) ===",
            store.name,
            store.product_urls.len()
        );
        let run_id = repo.begin_scrape_run(store.id).unwrap_or(0);

        let crawler = self.crawler()?;
        let products = crawler
            .crawl_store(&store.product_urls, self.config.crawl.store_max_products)
            .await;

        if products.is_empty() {
            repo.finish_scrape_run(run_id, 0, 0, Some("no products found")).ok();
            return Err(ScrapeError::NoProductsFound);
        }

        let mut saved: Vec<SavedOffer> = Vec::new();
        let mut total_specs = 0usize;

        for product in &products {
            total_specs += product.specs.len();
            match persist_product(&repo, &store, product) {
                Ok(()) => saved.push(SavedOffer {
                    product: product.name.clone(),
                    price: product.price,
                    store: store.name.clone(),
                    spec_count: product.specs.len(),
                }),
                Err(e) => warn!("Failed to save {}: {:#}", product.name, e),
            }
        }

        repo.finish_scrape_run(
            run_id,
            products.len(),
            saved.len(),
            if saved.len() < products.len() {
                Some("some products failed to save")
            } else {
                None
            },
        )
        .ok();

        let report = ScrapeReport {
            message: format!(
                "{} of {} scraped products saved for {}",
                saved.len(),
                products.len(),
                store.name
            ),
            total_found: products.len(),
            total_saved: saved.len(),
            total_specs,
            urls_scraped: store.product_urls.len(),
            sample: saved.into_iter().take(5).collect(),
        };

        info!("=== {} ===", report.message);
        Ok(report)
    }

    /// Ad-hoc crawl of one listing URL; nothing is persisted.
    pub async fn scrape_url(
        &self,
        url: &str,
        max_products: usize,
    ) -> Result<Vec<ScrapedProduct>, ScrapeError> {
        if url.trim().is_empty() {
            return Err(ScrapeError::InvalidInput("url is required".to_string()));
        }
        Url::parse(url)
            .map_err(|e| ScrapeError::InvalidInput(format!("bad url {}: {}", url, e)))?;

        let products = self.crawler()?.crawl(url, max_products).await;
        if products.is_empty() {
            return Err(ScrapeError::NoProductsFound);
        }
        Ok(products)
    }

    fn crawler(&self) -> Result<Crawler<HttpClient>, ScrapeError> {
        let client =
            HttpClient::new(&self.config.scraper).context("Failed to build scraper")?;
        Ok(Crawler::new(client, &self.config.crawl))
    }
}

/// Find-or-create the catalog product, then upsert this store's offer.
fn persist_product(repo: &Repository, store: &Store, product: &ScrapedProduct) -> Result<()> {
    let prefix: String = product.name.chars().take(NAME_MATCH_PREFIX).collect();
    let product_id = match repo.find_product_by_name_prefix(&prefix)? {
        Some(id) => id,
        None => repo.create_product(product)?,
    };
    repo.upsert_offer(product_id, store.id, product)?;
    Ok(())
}
