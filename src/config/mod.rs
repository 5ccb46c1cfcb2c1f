use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP fetching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Timeout for listing-page fetches.
    #[serde(default = "default_listing_timeout_secs")]
    pub listing_timeout_secs: u64,

    /// Timeout for product detail-page fetches (specs special case).
    #[serde(default = "default_detail_timeout_secs")]
    pub detail_timeout_secs: u64,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Crawl budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Global product cap for a full store crawl.
    #[serde(default = "default_store_max_products")]
    pub store_max_products: usize,

    /// Product cap for a single ad-hoc URL scrape.
    #[serde(default = "default_adhoc_max_products")]
    pub adhoc_max_products: usize,

    /// Hard page-fetch ceiling per seed URL.
    #[serde(default = "default_max_pages_per_seed")]
    pub max_pages_per_seed: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_listing_timeout_secs() -> u64 {
    15
}
fn default_detail_timeout_secs() -> u64 {
    10
}
fn default_max_redirects() -> usize {
    3
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    2
}
fn default_user_agent() -> String {
    // Persian storefronts serve stripped-down pages to unknown agents.
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}
fn default_store_max_products() -> usize {
    10
}
fn default_adhoc_max_products() -> usize {
    20
}
fn default_max_pages_per_seed() -> usize {
    5
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/narkhyab.duckdb")
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("NARKHYAB").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            listing_timeout_secs: default_listing_timeout_secs(),
            detail_timeout_secs: default_detail_timeout_secs(),
            max_redirects: default_max_redirects(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            store_max_products: default_store_max_products(),
            adhoc_max_products: default_adhoc_max_products(),
            max_pages_per_seed: default_max_pages_per_seed(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}
