//! Persistence Layer
//!
//! SQLite storage for trades, trade events, broker-relay forwarding
//! configs and the operator activity log, via sqlx.
//!
//! # Database Schema
//!
//! ## trades
//! - id: INTEGER (autoincrement)
//! - ticker, direction ("long" | "short"), entry_price, stop_loss, take_profit
//! - quantity, strategy (nullable label)
//! - status ("open" | "closed"), exit_price, exit_reason, pnl, pnl_percent
//! - opened_at, closed_at
//!
//! ## trade_events
//! - id, trade_id (FK, ON DELETE CASCADE), event_type, price
//! - raw_payload: JSON snapshot of the signal
//! - created_at
//!
//! ## forwarding_configs
//! - id, name, enabled, webhook_urls (JSON array)
//! - allowed_tickers (JSON object ticker -> [strategy]), symbol_map (JSON object)
//! - risk_percentage, rounding_mode ("up" | "down"), token, account_id
//! - paused_until, created_at, updated_at
//!
//! ## activity_log
//! - id, level, category, message, metadata (JSON), created_at
//!
//! Timestamps are always bound from Rust (RFC 3339, UTC) so range
//! comparisons stay lexicographic; no column relies on `CURRENT_TIMESTAMP`.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::domain::repositories::RepositoryError;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl From<DatabaseError> for RepositoryError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::ConnectionError(e) => RepositoryError::Unavailable(e.to_string()),
            DatabaseError::MigrationError(msg) => RepositoryError::Query(msg),
        }
    }
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `config`: URL and pool size (e.g. "sqlite://data/signal_relay.db")
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let log_level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Trace
    };
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(log_level);

    // Every connection to `:memory:` is its own database, so pin a single
    // connection for the pool's whole life.
    let pool = if config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// In-memory database for tests.
pub async fn init_memory_database() -> Result<DbPool, DatabaseError> {
    init_database(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        log_queries: false,
    })
    .await
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let statements: [(&str, &str); 8] = [
        (
            "trades table",
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                direction TEXT NOT NULL CHECK(direction IN ('long', 'short')),
                entry_price REAL NOT NULL,
                stop_loss REAL,
                take_profit REAL,
                quantity REAL NOT NULL DEFAULT 1.0,
                strategy TEXT,
                status TEXT NOT NULL CHECK(status IN ('open', 'closed')),
                exit_price REAL,
                exit_reason TEXT CHECK(exit_reason IN ('take_profit', 'stop_loss', 'manual', 'breakeven')),
                pnl REAL,
                pnl_percent REAL,
                opened_at TEXT NOT NULL,
                closed_at TEXT
            )
            "#,
        ),
        (
            "trade_events table",
            r#"
            CREATE TABLE IF NOT EXISTS trade_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_id INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                price REAL NOT NULL,
                raw_payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (trade_id) REFERENCES trades(id) ON DELETE CASCADE
            )
            "#,
        ),
        (
            "forwarding_configs table",
            r#"
            CREATE TABLE IF NOT EXISTS forwarding_configs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT 0,
                webhook_urls TEXT NOT NULL DEFAULT '[]',
                allowed_tickers TEXT NOT NULL DEFAULT '{}',
                symbol_map TEXT NOT NULL DEFAULT '{}',
                risk_percentage REAL NOT NULL DEFAULT 100.0,
                rounding_mode TEXT NOT NULL DEFAULT 'down' CHECK(rounding_mode IN ('up', 'down')),
                token TEXT NOT NULL DEFAULT '',
                account_id TEXT NOT NULL DEFAULT '',
                paused_until TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        ),
        (
            "activity_log table",
            r#"
            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                category TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT 'null',
                created_at TEXT NOT NULL
            )
            "#,
        ),
        (
            "idx_trades_ticker_status",
            "CREATE INDEX IF NOT EXISTS idx_trades_ticker_status ON trades(ticker, status)",
        ),
        (
            "idx_trades_opened_at",
            "CREATE INDEX IF NOT EXISTS idx_trades_opened_at ON trades(opened_at)",
        ),
        (
            "idx_trade_events_trade_id",
            "CREATE INDEX IF NOT EXISTS idx_trade_events_trade_id ON trade_events(trade_id, created_at)",
        ),
        (
            "idx_activity_log_created_at",
            "CREATE INDEX IF NOT EXISTS idx_activity_log_created_at ON activity_log(created_at)",
        ),
    ];

    for (name, sql) in statements {
        sqlx::query(sql).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {}: {}", name, e))
        })?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Liveness probe used by the health endpoint.
pub async fn ping(pool: &DbPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/signal_relay.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/signal_relay.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_URL").unwrap_or(defaults.url);

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_connections);

        let log_queries = std::env::var("DATABASE_LOG_QUERIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.log_queries);

        Self {
            url,
            max_connections,
            log_queries,
        }
    }
}
