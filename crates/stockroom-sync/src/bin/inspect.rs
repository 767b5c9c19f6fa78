//! # Sync State Inspector
//!
//! Prints the persisted sync state of a Stockroom database.
//!
//! ## Usage
//! ```bash
//! # Use the configured database
//! cargo run -p stockroom-sync --bin stockroom-sync-inspect
//!
//! # Specify database path
//! cargo run -p stockroom-sync --bin stockroom-sync-inspect -- --db ./data/stockroom.db
//!
//! # Specify config file
//! cargo run -p stockroom-sync --bin stockroom-sync-inspect -- --config ./sync.toml
//! ```
//!
//! The engine is restored with an offline client, so nothing is dispatched
//! and nothing is rewritten beyond what restore itself normalizes.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use stockroom_db::Database;
use stockroom_sync::{init_tracing, OfflineClient, SyncConfig, SyncEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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
                println!("Stockroom Sync State Inspector");
                println!();
                println!("Usage: stockroom-sync-inspect [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: from config)");
                println!("  -c, --config <PATH>    Config file path (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();

    let config = SyncConfig::load(config_path)?;
    let db_path = db_path
        .or_else(|| config.database_path())
        .ok_or("no database path configured and no platform data directory found")?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let db = Arc::new(Database::open(&db_path).await?);
    let schema = db.schema_status().await?;

    eprintln!("Database:   {}", db.location());
    eprintln!("Schema:     {}/{} migrations", schema.applied, schema.known);

    let engine = SyncEngine::builder(config)
        .with_store(db.clone())
        .with_client(Arc::new(OfflineClient))
        .build()?;
    engine.restore().await;

    let status = engine.status();
    eprintln!(
        "Pending:    {}  Failed: {}  Conflicts: {}",
        status.pending_count(),
        status.failed_count(),
        status.unresolved_conflicts
    );
    println!("{}", serde_json::to_string_pretty(&status)?);

    db.close().await;
    Ok(())
}
