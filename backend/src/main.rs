//! Inventory ledger administration
//!
//! `ledger-admin migrate` applies the schema.
//! `ledger-admin audit` checks every stock balance against its journal and
//! exits with an error when any balance disagrees.

use std::time::Duration;

use anyhow::{bail, Context};
use inventory_ledger::{Config, InventoryService, PgStore};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "usage: ledger-admin <migrate|audit>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("loading configuration")?;

    init_tracing(&config);

    let command = std::env::args().nth(1).unwrap_or_default();
    tracing::info!(environment = %config.environment, %command, "starting ledger-admin");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await
        .context("connecting to database")?;

    tracing::info!("Database connection established");

    match command.as_str() {
        "migrate" => {
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            tracing::info!("Migrations completed");
        }
        "audit" => {
            // Run migrations in development
            if config.environment == "development" {
                sqlx::migrate!("./migrations").run(&db_pool).await?;
            }

            let store = PgStore::new(db_pool, config.ledger.lock_timeout_ms);
            let inventory = InventoryService::new(store, config.ledger.clone());
            let reports = inventory.reconcile_all().await?;
            let mismatched = reports.iter().filter(|r| !r.consistent).count();

            println!("{}", serde_json::to_string_pretty(&reports)?);
            tracing::info!(balances = reports.len(), mismatched, "audit finished");

            if mismatched > 0 {
                bail!("{} stock balance(s) disagree with the journal", mismatched);
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
