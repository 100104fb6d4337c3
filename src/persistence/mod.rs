//! Persistence Layer
//!
//! The append-only trade ledger and the derived position book, stored
//! in SQLite with async access via sqlx.
//!
//! # Database Schema
//!
//! ## Trades Table (the ledger, source of truth)
//! - id: Integer rowid
//! - trade_id: Unique application id ("T...")
//! - symbol: Ticker
//! - quantity: Positive integer shares
//! - gmv: Positive gross monetary value
//! - side: "BUY" or "SELL"
//! - portfolio_name / user_id: Grouping keys
//! - timestamp: Execution time
//! - created_at: Row creation time
//!
//! Rows are never updated or deleted.
//!
//! ## Positions Table (derived cache)
//! - user_id + symbol: Unique pair
//! - quantity, average_cost, current_price
//! - unrealized_pnl, realized_pnl
//! - last_updated / created_at

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Ledger storage errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    /// The generated trade id collided with an existing row. The caller
    /// regenerates the id and retries the append exactly once.
    #[error("Duplicate trade id: {0}")]
    DuplicateId(String),

    #[error("Trade not found: {0}")]
    NotFound(String),

    #[error("Corrupt ledger row {0}: {1}")]
    Corrupt(String, String),
}

/// Initialize the database connection pool and run migrations.
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/slackoms.db")
pub async fn init_database(database_url: &str) -> Result<DbPool, LedgerError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Connection(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), LedgerError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trade_id TEXT NOT NULL UNIQUE,
            symbol TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity > 0),
            gmv REAL NOT NULL CHECK(gmv > 0),
            side TEXT NOT NULL CHECK(side IN ('BUY', 'SELL')),
            portfolio_name TEXT NOT NULL,
            user_id TEXT NOT NULL,
            timestamp DATETIME NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LedgerError::Migration(format!("Failed to create trades table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS positions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            average_cost REAL NOT NULL DEFAULT 0,
            current_price REAL NOT NULL DEFAULT 0,
            unrealized_pnl REAL NOT NULL DEFAULT 0,
            realized_pnl REAL NOT NULL DEFAULT 0,
            last_updated DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, symbol)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LedgerError::Migration(format!("Failed to create positions table: {}", e)))?;

    // Indexes for the ledger's read paths
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_portfolio ON trades(portfolio_name)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_timestamp ON trades(timestamp)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_user ON positions(user_id)")
        .execute(pool)
        .await
        .map_err(|e| LedgerError::Migration(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/slackoms.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/slackoms.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/slackoms.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            url,
            max_connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('trades', 'positions')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 2);
    }

    #[tokio::test]
    async fn test_trades_table_rejects_bad_rows() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        // Zero quantity violates the ledger's CHECK constraint.
        let result = sqlx::query(
            "INSERT INTO trades (trade_id, symbol, quantity, gmv, side, portfolio_name, user_id, timestamp) \
             VALUES ('T1', 'AAPL', 0, 100.0, 'BUY', 'p', 'u', CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());

        // Unknown side.
        let result = sqlx::query(
            "INSERT INTO trades (trade_id, symbol, quantity, gmv, side, portfolio_name, user_id, timestamp) \
             VALUES ('T2', 'AAPL', 1, 100.0, 'HOLD', 'p', 'u', CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/slackoms.db");
        assert_eq!(config.max_connections, 5);
    }
}
