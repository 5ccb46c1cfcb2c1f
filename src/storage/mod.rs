use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

use crate::models::{ScrapedProduct, Store};

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_store_id START 1;
CREATE SEQUENCE IF NOT EXISTS seq_product_id START 1;
CREATE SEQUENCE IF NOT EXISTS seq_offer_id START 1;
CREATE SEQUENCE IF NOT EXISTS seq_run_id START 1;

CREATE TABLE IF NOT EXISTS stores (
    id            BIGINT PRIMARY KEY DEFAULT nextval('seq_store_id'),
    name          VARCHAR NOT NULL,
    base_url      VARCHAR NOT NULL,
    -- JSON-encoded list of listing-page seed URLs
    product_urls  VARCHAR NOT NULL DEFAULT '[]',
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id          BIGINT PRIMARY KEY DEFAULT nextval('seq_product_id'),
    name        VARCHAR NOT NULL,
    main_image  VARCHAR,
    -- JSON-encoded attribute map
    specs       VARCHAR,
    created_at  TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS store_offers (
    id                 BIGINT PRIMARY KEY DEFAULT nextval('seq_offer_id'),
    product_id         BIGINT NOT NULL,
    store_id           BIGINT NOT NULL,
    price              BIGINT NOT NULL,
    original_price     BIGINT,
    store_product_url  VARCHAR,
    last_checked       TIMESTAMP NOT NULL,
    UNIQUE (product_id, store_id)
);

CREATE TABLE IF NOT EXISTS scrape_runs (
    id               BIGINT PRIMARY KEY DEFAULT nextval('seq_run_id'),
    store_id         BIGINT,
    started_at       TIMESTAMP NOT NULL,
    finished_at      TIMESTAMP,
    status           VARCHAR NOT NULL DEFAULT 'running',
    products_found   INTEGER DEFAULT 0,
    products_saved   INTEGER DEFAULT 0,
    error_msg        VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_offers_store   ON store_offers (store_id);
CREATE INDEX IF NOT EXISTS idx_offers_product ON store_offers (product_id);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn
            .execute_batch(INDEXES)
            .context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Stores ────────────────────────────────────────────────────────────────

    pub fn add_store(&self, name: &str, base_url: &str, product_urls: &[String]) -> Result<Store> {
        let now = Utc::now().naive_utc();
        let urls_json = serde_json::to_string(product_urls)?;
        let id: i64 = self
            .conn
            .query_row(
                r#"INSERT INTO stores (name, base_url, product_urls, created_at)
                   VALUES (?, ?, ?, ?) RETURNING id"#,
                params![name, base_url, urls_json, now],
                |r| r.get(0),
            )
            .with_context(|| format!("insert store {}", name))?;

        Ok(Store {
            id,
            name: name.to_string(),
            base_url: base_url.to_string(),
            product_urls: product_urls.to_vec(),
            is_active: true,
            created_at: now,
        })
    }

    pub fn find_store(&self, id: i64) -> Result<Option<Store>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, base_url, product_urls, is_active, created_at
             FROM stores WHERE id = ?",
        )?;
        let store = stmt
            .query_row(params![id], |r| {
                Ok(row_to_store(
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                ))
            })
            .ok();
        Ok(store)
    }

    pub fn list_stores(&self) -> Result<Vec<Store>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, base_url, product_urls, is_active, created_at
             FROM stores WHERE is_active ORDER BY created_at DESC, id DESC",
        )?;
        let stores: Vec<Store> = stmt
            .query_map([], |r| {
                Ok(row_to_store(
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(stores)
    }

    // ── Products ──────────────────────────────────────────────────────────────

    /// Containment search on a name prefix, so a re-scrape with a slightly
    /// longer or shorter title maps onto the same catalog product.
    pub fn find_product_by_name_prefix(&self, prefix: &str) -> Result<Option<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM products WHERE name LIKE '%' || ? || '%' LIMIT 1")?;
        let id: Option<i64> = stmt.query_row(params![prefix], |r| r.get(0)).ok();
        Ok(id)
    }

    pub fn create_product(&self, product: &ScrapedProduct) -> Result<i64> {
        let specs_json = if product.specs.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&product.specs)?)
        };

        let id: i64 = self
            .conn
            .query_row(
                r#"INSERT INTO products (name, main_image, specs, created_at)
                   VALUES (?, ?, ?, ?) RETURNING id"#,
                params![product.name, product.image, specs_json, Utc::now().naive_utc()],
                |r| r.get(0),
            )
            .with_context(|| format!("insert product {}", product.name))?;
        Ok(id)
    }

    pub fn product_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM products")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Offers ────────────────────────────────────────────────────────────────

    /// Upsert the (product, store) offer — idempotent, safe to re-run.
    pub fn upsert_offer(
        &self,
        product_id: i64,
        store_id: i64,
        product: &ScrapedProduct,
    ) -> Result<()> {
        self.conn
            .execute(
                r#"INSERT INTO store_offers
                       (product_id, store_id, price, original_price, store_product_url, last_checked)
                   VALUES (?, ?, ?, ?, ?, ?)
                   ON CONFLICT (product_id, store_id) DO UPDATE SET
                       price             = excluded.price,
                       original_price    = excluded.original_price,
                       store_product_url = excluded.store_product_url,
                       last_checked      = excluded.last_checked"#,
                params![
                    product_id,
                    store_id,
                    product.price as i64,
                    product.original_price.map(|p| p as i64),
                    product.url,
                    Utc::now().naive_utc(),
                ],
            )
            .with_context(|| format!("upsert offer product={} store={}", product_id, store_id))?;
        Ok(())
    }

    pub fn offer_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM store_offers")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn store_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM stores")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_scrape_run(&self, store_id: i64) -> Result<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO scrape_runs (store_id, started_at, status)
             VALUES (?, ?, 'running') RETURNING id",
            params![store_id, Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_scrape_run(
        &self,
        run_id: i64,
        found: usize,
        saved: usize,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               products_found = ?, products_saved = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                found as i64,
                saved as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }
}

fn row_to_store(
    id: i64,
    name: String,
    base_url: String,
    product_urls: String,
    is_active: bool,
    created_at: NaiveDateTime,
) -> Store {
    Store {
        id,
        name,
        base_url,
        // Decode here so callers only ever see a typed list.
        product_urls: serde_json::from_str(&product_urls).unwrap_or_default(),
        is_active,
        created_at,
    }
}
