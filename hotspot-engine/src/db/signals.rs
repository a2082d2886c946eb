//! Signal database operations

use crate::db::repository::{SignalFilter, SignalRepository};
use crate::db::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{DomainClassification, FeatureBundle, Severity, Signal};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotspot_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const SIGNAL_COLUMNS: &str = "id, scope, title, description, severity, department, team, category, \
     received_at, features, features_generated_at, classification";

/// SQLite-backed signal repository
#[derive(Clone)]
pub struct SqliteSignalRepository {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }
}

fn signal_from_row(row: &SqliteRow) -> Result<Signal> {
    let id: String = row.try_get("id")?;
    let severity: String = row.try_get("severity")?;
    let received_at: String = row.try_get("received_at")?;
    let features: Option<String> = row.try_get("features")?;
    let features_generated_at: Option<String> = row.try_get("features_generated_at")?;
    let classification: Option<String> = row.try_get("classification")?;

    Ok(Signal {
        id: parse_uuid(&id)?,
        scope: row.try_get("scope")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| Error::Internal(format!("Unknown severity '{}' on signal {}", severity, id)))?,
        department: row.try_get("department")?,
        team: row.try_get("team")?,
        category: row.try_get("category")?,
        received_at: parse_timestamp(&received_at)?,
        features: features.map(|json| serde_json::from_str::<FeatureBundle>(&json)).transpose()?,
        features_generated_at: features_generated_at.map(|ts| parse_timestamp(&ts)).transpose()?,
        classification: classification
            .map(|json| serde_json::from_str::<DomainClassification>(&json))
            .transpose()?,
    })
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn insert_signal(&self, signal: &Signal) -> Result<()> {
        // Prepare all data before touching the pool
        let id = signal.id.to_string();
        let received_at = format_timestamp(&signal.received_at);
        let features = signal.features.as_ref().map(serde_json::to_string).transpose()?;
        let features_generated_at = signal.features_generated_at.as_ref().map(format_timestamp);
        let classification = signal.classification.as_ref().map(serde_json::to_string).transpose()?;

        retry_on_lock("insert_signal", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO signals (
                    id, scope, title, description, severity, department, team, category,
                    received_at, features, features_generated_at, classification
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&signal.scope)
            .bind(&signal.title)
            .bind(&signal.description)
            .bind(signal.severity.as_str())
            .bind(&signal.department)
            .bind(&signal.team)
            .bind(&signal.category)
            .bind(&received_at)
            .bind(&features)
            .bind(&features_generated_at)
            .bind(&classification)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn get_signal(&self, id: Uuid) -> Result<Option<Signal>> {
        let row = sqlx::query(&format!("SELECT {} FROM signals WHERE id = ?", SIGNAL_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(signal_from_row).transpose()
    }

    async fn fetch_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>> {
        let received_after = filter.received_after.as_ref().map(format_timestamp);
        // SQLite treats a negative LIMIT as unbounded
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM signals \
             WHERE scope = ? AND (? IS NULL OR received_at > ?) \
             ORDER BY received_at DESC, id ASC \
             LIMIT ?",
            SIGNAL_COLUMNS
        ))
        .bind(&filter.scope)
        .bind(&received_after)
        .bind(&received_after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    async fn write_features(&self, id: Uuid, bundle: &FeatureBundle, generated_at: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        let features = serde_json::to_string(bundle)?;
        let generated_at = format_timestamp(&generated_at);

        let updated = retry_on_lock("write_features", self.max_lock_wait_ms, || async {
            let result = sqlx::query("UPDATE signals SET features = ?, features_generated_at = ? WHERE id = ?")
                .bind(&features)
                .bind(&generated_at)
                .bind(&id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("signal {}", id)));
        }
        Ok(())
    }

    async fn write_classification(&self, id: Uuid, classification: &DomainClassification) -> Result<()> {
        let id = id.to_string();
        let classification = serde_json::to_string(classification)?;

        let updated = retry_on_lock("write_classification", self.max_lock_wait_ms, || async {
            let result = sqlx::query("UPDATE signals SET classification = ? WHERE id = ?")
                .bind(&classification)
                .bind(&id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            return Err(Error::NotFound(format!("signal {}", id)));
        }
        Ok(())
    }

    async fn count_signals(&self, scope: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals WHERE scope = ?")
            .bind(scope)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
