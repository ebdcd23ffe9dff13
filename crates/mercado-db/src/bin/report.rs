//! # Dashboard Report
//!
//! Prints the dashboard aggregates of a store as JSON.
//!
//! ## Usage
//! ```bash
//! # Dashboard, 30-day sales window and inventory summary
//! MERCADO_DATABASE_PATH=./mercado.db cargo run -p mercado-db --bin report
//!
//! # Wider sales window
//! cargo run -p mercado-db --bin report -- --days 90
//! ```

use mercado_db::{Database, MercadoConfig};
use serde_json::json;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut days: i64 = 30;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse()?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mercado Dashboard Report");
                println!();
                println!("Usage: report [OPTIONS]");
                println!();
                println!("Options:");
                println!("      --days <N>   Sales window in days (default: 30)");
                println!("  -h, --help       Show this help message");
                println!();
                println!("The database is read from MERCADO_DATABASE_PATH.");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = MercadoConfig::from_env()?;
    let db = Database::new(config.db_config()).await?;
    let dashboard = db.dashboard();

    let report = json!({
        "dashboard": dashboard.dashboard_stats().await?,
        "sales": dashboard.sales_stats(days).await?,
        "inventory": dashboard.inventory_summary().await?,
        "orders": db.orders().stats().await?,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;
    Ok(())
}
