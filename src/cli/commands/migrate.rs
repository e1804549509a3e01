//! Schema migration commands.

use tokio::runtime::Runtime;
use tracing::info;

use crate::config::{Config, ConfigArgs, DatabaseConfig};
use crate::db;

/// Apply every pending migration.
pub fn cmd_migrate(rt: &Runtime, args: &ConfigArgs) -> anyhow::Result<()> {
    let database = Config::load_database(args)?;
    rt.block_on(migrate(database))
}

/// Revert the last applied migration.
pub fn cmd_rollback(rt: &Runtime, args: &ConfigArgs) -> anyhow::Result<()> {
    let database = Config::load_database(args)?;
    rt.block_on(rollback(database))
}

async fn migrate(database: DatabaseConfig) -> anyhow::Result<()> {
    let pool = db::init_db(&database.url, database.max_connections).await?;
    pool.close().await;

    info!("Migrations applied");
    println!("Database is up to date.");
    Ok(())
}

async fn rollback(database: DatabaseConfig) -> anyhow::Result<()> {
    let pool = db::init_db(&database.url, database.max_connections).await?;
    let reverted = db::rollback_last_migration(&pool).await?;
    pool.close().await;

    match reverted {
        Some(version) => {
            info!(version, "Migration reverted");
            println!("Reverted migration {}.", version);
        }
        None => println!("No migrations to revert."),
    }
    Ok(())
}
