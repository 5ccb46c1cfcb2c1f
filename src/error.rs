use thiserror::Error;

/// Caller-visible failure classes for a scrape invocation. Everything that
/// can be recovered inside a crawl (dead seed URLs, unparseable prices,
/// missing specs) never surfaces here; these are the structural failures.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Missing or malformed request input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store {0} not found")]
    StoreNotFound(i64),

    /// The store exists but has no listing URLs configured.
    #[error("store {0} has no product URLs configured")]
    NoSeedUrls(i64),

    /// Every seed was crawled (or failed) and nothing plausible came back.
    #[error("no products found; check the configured listing URLs")]
    NoProductsFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ScrapeError {
    /// HTTP-equivalent status class, for callers fronting this with an API.
    pub fn status(&self) -> u16 {
        match self {
            ScrapeError::InvalidInput(_) | ScrapeError::NoSeedUrls(_) => 400,
            ScrapeError::StoreNotFound(_) | ScrapeError::NoProductsFound => 404,
            ScrapeError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert_eq!(ScrapeError::InvalidInput("x".into()).status(), 400);
        assert_eq!(ScrapeError::NoSeedUrls(7).status(), 400);
        assert_eq!(ScrapeError::StoreNotFound(7).status(), 404);
        assert_eq!(ScrapeError::NoProductsFound.status(), 404);
        assert_eq!(
            ScrapeError::Internal(anyhow::anyhow!("boom")).status(),
            500
        );
    }
}
