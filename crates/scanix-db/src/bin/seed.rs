//! # Seed Data Generator
//!
//! Populates a ledger database with deposits, tiered products and opening
//! stock for development.
//!
//! ## Usage
//! ```bash
//! # Use ledger.toml / SCANIX_DB_PATH / defaults
//! cargo run -p scanix-db --bin seed
//!
//! # Specify database path
//! cargo run -p scanix-db --bin seed -- --db ./data/scanix.db
//!
//! # Read a specific config file
//! cargo run -p scanix-db --bin seed -- --config ./ledger.toml
//! ```
//!
//! ## Generated Data
//! - 3 deposits: `DEP-CENTRAL`, `DEP-NORTE` (active), `DEP-VIEJO` (inactive)
//! - Products with 0-3 volume tiers each
//! - Opening stock recorded as `entrada` movements, so the movement log and
//!   the stock projection agree from the start

use std::env;
use std::path::PathBuf;

use scanix_core::{Deposit, Money, Product, Tier};
use scanix_db::{Database, LedgerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// (sku, name, base price cents, tiers as (min, max, cents))
const PRODUCTS: &[(&str, &str, i64, &[(i64, Option<i64>, i64)])] = &[
    (
        "YER-1KG",
        "Yerba Mate 1kg",
        10_000,
        &[(1, Some(5), 10_000), (6, Some(12), 9_300), (13, None, 8_500)],
    ),
    (
        "AZU-1KG",
        "Azucar 1kg",
        1_250,
        &[(1, Some(9), 1_250), (10, None, 1_100)],
    ),
    ("ACE-900", "Aceite Girasol 900ml", 2_890, &[]),
    (
        "FID-500",
        "Fideos Tallarin 500g",
        990,
        &[(1, Some(23), 990), (24, None, 850)],
    ),
    ("HAR-1KG", "Harina 000 1kg", 780, &[(1, Some(9), 780), (10, None, 700)]),
    ("LEC-1L", "Leche Entera 1L", 1_150, &[]),
    (
        "GAL-CHO",
        "Galletitas Chocolate",
        1_420,
        &[(1, Some(11), 1_420), (12, Some(47), 1_300), (48, None, 1_200)],
    ),
];

const DEPOSITS: &[(&str, &str, Option<&str>, bool)] = &[
    ("DEP-CENTRAL", "Deposito Central", Some("Av. Siempre Viva 742"), true),
    ("DEP-NORTE", "Sucursal Norte", None, true),
    ("DEP-VIEJO", "Deposito Viejo", None, false),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scanix=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Scanix Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("Scanix Ledger Seed Data Generator");
    println!("=================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database, migrations applied");

    let catalog = db.catalog();
    let existing = catalog.list_products().await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (id, name, address, active) in DEPOSITS {
        catalog
            .insert_deposit(&Deposit {
                id: id.to_string(),
                name: name.to_string(),
                address: address.map(str::to_string),
                active: *active,
            })
            .await?;
    }
    println!("✓ {} deposits", DEPOSITS.len());

    let adjustments = db.adjustments();
    for (index, (sku, name, base_cents, tiers)) in PRODUCTS.iter().enumerate() {
        let product = Product {
            id: format!("prod-{}", sku.to_lowercase()),
            sku: sku.to_string(),
            name: name.to_string(),
            base_price: Money::from_cents(*base_cents),
            tiers: tiers
                .iter()
                .map(|(min, max, cents)| Tier::new(*min, *max, Money::from_cents(*cents)))
                .collect(),
        };

        let report = catalog.insert_product(&product).await?;
        if !report.is_clean() {
            println!("  {}: tier warnings {:?}", product.sku, report.warnings);
        }

        // Deterministic opening stock: 20-110 central, 0-30 north
        let central = 20 + ((index as i64 * 37) % 91);
        let north = (index as i64 * 13) % 31;

        for (deposit_id, quantity) in [("DEP-CENTRAL", central), ("DEP-NORTE", north)] {
            if quantity > 0 {
                adjustments
                    .receive_stock(deposit_id, &product.id, quantity, "Stock inicial", Some("seed"))
                    .await?;
            }
        }
    }
    println!("✓ {} products with opening stock", PRODUCTS.len());

    let report = db.ledger().verify_projection().await?;
    info!(consistent = report.is_consistent(), "Projection check after seeding");

    println!();
    println!("Projection check:");
    println!("{}", serde_json::to_string_pretty(&report)?);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
