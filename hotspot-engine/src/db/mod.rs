//! Database access for hotspot-engine
//!
//! SQLite through sqlx. Identifiers and timestamps are stored as TEXT,
//! structured annotations as JSON TEXT.

pub mod hotspots;
pub mod repository;
pub mod signals;

pub use hotspots::SqliteHotspotRepository;
pub use repository::{HotspotRepository, SignalFilter, SignalRepository};
pub use signals::SqliteSignalRepository;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Initialize database connection pool
///
/// Creates the database file and its parent folder when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(250));
    let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signals (
            id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            severity TEXT NOT NULL,
            department TEXT,
            team TEXT,
            category TEXT,
            received_at TEXT NOT NULL,
            features TEXT,
            features_generated_at TEXT,
            classification TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_scope_received ON signals(scope, received_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hotspots (
            id TEXT PRIMARY KEY,
            scope TEXT NOT NULL,
            title TEXT NOT NULL,
            summary TEXT NOT NULL,
            status TEXT NOT NULL,
            rank_score REAL NOT NULL,
            confidence REAL NOT NULL,
            root_cause TEXT NOT NULL,
            clustering_method TEXT NOT NULL,
            similarity_threshold REAL NOT NULL,
            clustering_results TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            archived_by_pipeline INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(scope, fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hotspot_signals (
            hotspot_id TEXT NOT NULL REFERENCES hotspots(id) ON DELETE CASCADE,
            signal_id TEXT NOT NULL,
            strength REAL NOT NULL,
            is_outlier INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (hotspot_id, signal_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_hotspot_signals_signal ON hotspot_signals(signal_id)")
        .execute(pool)
        .await?;

    // Databases created before the column existed
    ensure_column(pool, "hotspots", "archived_by_pipeline", "INTEGER NOT NULL DEFAULT 0").await?;

    tracing::info!("Database tables initialized (signals, hotspots, hotspot_signals)");

    Ok(())
}

/// Add a column via ALTER TABLE ADD COLUMN when the table lacks it
///
/// SQLite only accepts NOT NULL here together with a DEFAULT.
async fn ensure_column(pool: &SqlitePool, table: &str, column: &str, definition: &str) -> Result<()> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;
    let mut present = false;
    for row in &rows {
        let name: String = row.try_get("name")?;
        if name == column {
            present = true;
            break;
        }
    }
    if !present {
        tracing::info!(table, column, "Adding missing column");
        sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Fixed-width UTC timestamp so TEXT ordering matches time ordering
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> hotspot_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| hotspot_common::Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_uuid(value: &str) -> hotspot_common::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| hotspot_common::Error::Internal(format!("Failed to parse id '{}': {}", value, e)))
}
