mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::scraper::PageFetcher;
use crate::scraper::http_client::HttpClient;
use crate::scraper::price::normalize_price;
use crate::scraper::specs::extract_specs_from_html;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "narkhyab", about = "Persian e-commerce price scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every configured listing URL of a store and save the offers
    Crawl {
        #[arg(short, long)]
        store_id: i64,
    },

    /// Ad-hoc scrape of one listing URL; prints products, saves nothing
    ScrapeUrl {
        url: String,

        /// Product cap for this scrape
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Run the price normalizer against a raw price string
    TestPrice { text: String },

    /// Fetch a page and print the extracted specification attributes
    TestSpecs { url: String },

    /// Register a store with its listing-page seed URLs
    AddStore {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        base_url: String,

        /// Listing URLs to crawl (repeatable)
        #[arg(short, long = "url")]
        urls: Vec<String>,
    },

    /// List registered stores
    Stores,

    /// Show database statistics
    Stats,

    /// Apply schema migrations without scraping
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "narkhyab=info,warn",
        1 => "narkhyab=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Crawl { store_id } => {
            let _t = utils::Timer::start("Store crawl");
            match Pipeline::new(config).scrape_store(store_id).await {
                Ok(report) => {
                    println!("{}", report.message);
                    println!(
                        "  found {} | saved {} | specs {} | urls {}",
                        report.total_found,
                        report.total_saved,
                        report.total_specs,
                        report.urls_scraped
                    );
                    for offer in &report.sample {
                        println!(
                            "  • {} — {} ({} specs) @ {}",
                            offer.product,
                            utils::fmt_toman(offer.price),
                            offer.spec_count,
                            offer.store
                        );
                    }
                }
                Err(e) => {
                    eprintln!("error ({}): {}", e.status(), e);
                    std::process::exit(1);
                }
            }
        }

        Command::ScrapeUrl { url, max } => {
            let _t = utils::Timer::start("Ad-hoc scrape");
            let max = max.unwrap_or(config.crawl.adhoc_max_products);
            match Pipeline::new(config).scrape_url(&url, max).await {
                Ok(products) => {
                    println!("{} products:", products.len());
                    for p in &products {
                        println!("  • {} — {}", p.name, utils::fmt_toman(p.price));
                        if let Some(original) = p.original_price {
                            println!("    before discount: {}", utils::fmt_toman(original));
                        }
                        println!("    {} ({} specs)", p.url, p.specs.len());
                    }
                }
                Err(e) => {
                    eprintln!("error ({}): {}", e.status(), e);
                    std::process::exit(1);
                }
            }
        }

        Command::TestPrice { text } => {
            let price = normalize_price(&text);
            if price == 0 {
                println!("{:?} → no plausible price", text);
            } else {
                println!("{:?} → {} → {}", text, price, utils::fmt_toman(price));
            }
        }

        Command::TestSpecs { url } => {
            let client = HttpClient::new(&config.scraper)?;
            let html = client.fetch_detail(&url).await?;
            let specs = extract_specs_from_html(&html);
            if specs.is_empty() {
                println!("no specification attributes found on {}", url);
            } else {
                println!("{} attributes:", specs.len());
                for (key, value) in &specs {
                    println!("  {} : {}", key, value);
                }
            }
        }

        Command::AddStore { name, base_url, urls } => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            let store = repo.add_store(&name, &base_url, &urls)?;
            info!("store {} registered with id {}", store.name, store.id);
            println!("store {} (id {}) with {} listing URLs", store.name, store.id, urls.len());
        }

        Command::Stores => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            let stores = repo.list_stores()?;
            if stores.is_empty() {
                println!("No stores — run `narkhyab add-store` first.");
            } else {
                println!("{} stores:", stores.len());
                for s in &stores {
                    println!("  [{}] {} — {} ({} urls)", s.id, s.name, s.base_url, s.product_urls.len());
                }
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            repo.run_migrations()?;
            println!("─────────────────────────────────");
            println!("  narkhyab — Database Stats");
            println!("─────────────────────────────────");
            println!("  Stores   : {}", utils::fmt_number(repo.store_count()?));
            println!("  Products : {}", utils::fmt_number(repo.product_count()?));
            println!("  Offers   : {}", utils::fmt_number(repo.offer_count()?));
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
