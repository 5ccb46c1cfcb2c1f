use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rand::RngExt;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::debug;

use crate::config::ScraperConfig;
use crate::scraper::PageFetcher;

/// reqwest wrapper with the headers Persian storefronts expect, per-fetch
/// timeouts, a redirect cap, polite delays and bounded retries.
pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(true)
            // Some storefronts bounce requests without a cookie jar.
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text, with rate-limiting and bounded retry on
    /// transport errors and 429/503.
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String> {
        self.polite_delay().await;

        let strategy = ExponentialBackoff::from_millis(self.config.request_delay_ms.max(1))
            .map(jitter)
            .take(self.config.max_retries as usize);

        Retry::spawn(strategy, || self.try_get(url, timeout))
            .await
            .with_context(|| format!("All attempts exhausted for {}", url))
    }

    async fn try_get(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .timeout(timeout)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "fa-IR,fa;q=0.9,en;q=0.8")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .with_context(|| format!("Request error for {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status, url);
        }

        resp.text().await.context("Failed to read response body")
    }

    /// Sleep for the configured delay + random jitter between requests.
    async fn polite_delay(&self) {
        let extra = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        sleep(Duration::from_millis(self.config.request_delay_ms + extra)).await;
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_listing(&self, url: &str) -> Result<String> {
        self.get_text(url, Duration::from_secs(self.config.listing_timeout_secs))
            .await
    }

    async fn fetch_detail(&self, url: &str) -> Result<String> {
        self.get_text(url, Duration::from_secs(self.config.detail_timeout_secs))
            .await
    }
}
