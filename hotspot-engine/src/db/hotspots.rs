//! Hotspot database operations
//!
//! A run's drafts are committed in one transaction:
//! 1. Upsert each draft by (scope, fingerprint); existing rows keep their status
//!    unless the pipeline archived them, in which case they reopen
//! 2. Replace the hotspot's membership rows
//! 3. Demote older primary memberships of signals now owned by this run
//! 4. Archive open hotspots of the scope the run did not produce, marking
//!    them as archived by the pipeline

use crate::db::repository::HotspotRepository;
use crate::db::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{
    ClusteringResultsPayload, CommitSummary, Hotspot, HotspotDetail, HotspotDraft, HotspotSignal, HotspotStatus,
    RootCause, CLUSTERING_METHOD, RESULTS_PAYLOAD_VERSION,
};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotspot_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

const HOTSPOT_COLUMNS: &str = "id, scope, title, summary, status, rank_score, confidence, root_cause, \
     clustering_method, similarity_threshold, clustering_results, fingerprint, created_at, updated_at";

/// SQLite-backed hotspot repository
#[derive(Clone)]
pub struct SqliteHotspotRepository {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteHotspotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    async fn commit_once(
        &self,
        scope: &str,
        drafts: &[HotspotDraft],
        similarity_threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<CommitSummary> {
        let now_str = format_timestamp(&now);
        let mut summary = CommitSummary::default();
        let mut tx = self.pool.begin().await?;

        for draft in drafts {
            let payload = serde_json::to_string(&ClusteringResultsPayload {
                version: RESULTS_PAYLOAD_VERSION,
                quality_score: draft.actionability,
                generated_at: now,
            })?;

            let existing: Option<String> = sqlx::query_scalar("SELECT id FROM hotspots WHERE scope = ? AND fingerprint = ?")
                .bind(scope)
                .bind(&draft.fingerprint)
                .fetch_optional(&mut *tx)
                .await?;

            let hotspot_id = match existing {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE hotspots
                        SET title = ?, summary = ?, rank_score = ?, confidence = ?, root_cause = ?,
                            clustering_method = ?, similarity_threshold = ?, clustering_results = ?,
                            status = CASE WHEN archived_by_pipeline = 1 THEN ? ELSE status END,
                            archived_by_pipeline = 0,
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(&draft.title)
                    .bind(&draft.summary)
                    .bind(draft.rank_score)
                    .bind(draft.confidence)
                    .bind(draft.root_cause.as_str())
                    .bind(CLUSTERING_METHOD)
                    .bind(similarity_threshold)
                    .bind(&payload)
                    .bind(HotspotStatus::Open.as_str())
                    .bind(&now_str)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
                    summary.updated += 1;
                    id
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    sqlx::query(
                        r#"
                        INSERT INTO hotspots (
                            id, scope, title, summary, status, rank_score, confidence, root_cause,
                            clustering_method, similarity_threshold, clustering_results, fingerprint,
                            created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&id)
                    .bind(scope)
                    .bind(&draft.title)
                    .bind(&draft.summary)
                    .bind(HotspotStatus::Open.as_str())
                    .bind(draft.rank_score)
                    .bind(draft.confidence)
                    .bind(draft.root_cause.as_str())
                    .bind(CLUSTERING_METHOD)
                    .bind(similarity_threshold)
                    .bind(&payload)
                    .bind(&draft.fingerprint)
                    .bind(&now_str)
                    .bind(&now_str)
                    .execute(&mut *tx)
                    .await?;
                    summary.inserted += 1;
                    id
                }
            };

            sqlx::query("DELETE FROM hotspot_signals WHERE hotspot_id = ?")
                .bind(&hotspot_id)
                .execute(&mut *tx)
                .await?;

            for membership in &draft.memberships {
                let signal_id = membership.signal_id.to_string();
                sqlx::query(
                    "INSERT INTO hotspot_signals (hotspot_id, signal_id, strength, is_outlier) VALUES (?, ?, ?, ?)",
                )
                .bind(&hotspot_id)
                .bind(&signal_id)
                .bind(membership.strength)
                .bind(membership.is_outlier)
                .execute(&mut *tx)
                .await?;

                if !membership.is_outlier {
                    sqlx::query(
                        "UPDATE hotspot_signals SET is_outlier = 1 \
                         WHERE signal_id = ? AND hotspot_id != ? AND is_outlier = 0",
                    )
                    .bind(&signal_id)
                    .bind(&hotspot_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            summary.hotspot_ids.push(parse_uuid(&hotspot_id)?);
        }

        let produced: HashSet<Uuid> = summary.hotspot_ids.iter().copied().collect();
        let open_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM hotspots WHERE scope = ? AND status = ?")
            .bind(scope)
            .bind(HotspotStatus::Open.as_str())
            .fetch_all(&mut *tx)
            .await?;

        for id in open_ids {
            if produced.contains(&parse_uuid(&id)?) {
                continue;
            }
            sqlx::query("UPDATE hotspots SET status = ?, archived_by_pipeline = 1, updated_at = ? WHERE id = ?")
                .bind(HotspotStatus::Archived.as_str())
                .bind(&now_str)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            summary.archived += 1;
        }

        tx.commit().await?;
        Ok(summary)
    }

    async fn memberships(&self, hotspot_id: Uuid) -> Result<Vec<HotspotSignal>> {
        let rows = sqlx::query(
            "SELECT hotspot_id, signal_id, strength, is_outlier FROM hotspot_signals \
             WHERE hotspot_id = ? ORDER BY is_outlier ASC, strength DESC, signal_id ASC",
        )
        .bind(hotspot_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let hotspot_id: String = row.try_get("hotspot_id")?;
                let signal_id: String = row.try_get("signal_id")?;
                Ok(HotspotSignal {
                    hotspot_id: parse_uuid(&hotspot_id)?,
                    signal_id: parse_uuid(&signal_id)?,
                    strength: row.try_get("strength")?,
                    is_outlier: row.try_get("is_outlier")?,
                })
            })
            .collect()
    }
}

fn hotspot_from_row(row: &SqliteRow) -> Result<Hotspot> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let root_cause: String = row.try_get("root_cause")?;
    let clustering_results: String = row.try_get("clustering_results")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Hotspot {
        id: parse_uuid(&id)?,
        scope: row.try_get("scope")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        status: HotspotStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown status '{}' on hotspot {}", status, id)))?,
        rank_score: row.try_get("rank_score")?,
        confidence: row.try_get("confidence")?,
        root_cause: RootCause::parse(&root_cause)
            .ok_or_else(|| Error::Internal(format!("Unknown root cause '{}' on hotspot {}", root_cause, id)))?,
        clustering_method: row.try_get("clustering_method")?,
        similarity_threshold: row.try_get("similarity_threshold")?,
        clustering_results: serde_json::from_str(&clustering_results)?,
        fingerprint: row.try_get("fingerprint")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl HotspotRepository for SqliteHotspotRepository {
    async fn commit_run(&self, scope: &str, drafts: &[HotspotDraft], similarity_threshold: f64) -> Result<CommitSummary> {
        let now = Utc::now();
        let summary = retry_on_lock("commit_run", self.max_lock_wait_ms, || {
            self.commit_once(scope, drafts, similarity_threshold, now)
        })
        .await?;

        debug!(
            scope,
            inserted = summary.inserted,
            updated = summary.updated,
            archived = summary.archived,
            "Committed clustering run"
        );
        Ok(summary)
    }

    async fn list_hotspots(&self, scope: Option<&str>, status: Option<HotspotStatus>) -> Result<Vec<Hotspot>> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query(&format!(
            "SELECT {} FROM hotspots \
             WHERE (? IS NULL OR scope = ?) AND (? IS NULL OR status = ?) \
             ORDER BY rank_score DESC, created_at ASC, id ASC",
            HOTSPOT_COLUMNS
        ))
        .bind(scope)
        .bind(scope)
        .bind(status)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(hotspot_from_row).collect()
    }

    async fn get_hotspot(&self, id: Uuid) -> Result<Option<HotspotDetail>> {
        let row = sqlx::query(&format!("SELECT {} FROM hotspots WHERE id = ?", HOTSPOT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let hotspot = hotspot_from_row(&row)?;
        let signals = self.memberships(id).await?;
        Ok(Some(HotspotDetail { hotspot, signals }))
    }

    async fn update_status(&self, id: Uuid, status: HotspotStatus) -> Result<Hotspot> {
        let detail = self
            .get_hotspot(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("hotspot {}", id)))?;
        let mut hotspot = detail.hotspot;

        if hotspot.status == status {
            return Ok(hotspot);
        }
        if !hotspot.status.can_transition_to(status) {
            return Err(Error::InvalidInput(format!(
                "Cannot move hotspot from {} to {}",
                hotspot.status.as_str(),
                status.as_str()
            )));
        }

        let now = Utc::now();
        let now_str = format_timestamp(&now);
        let id_str = id.to_string();
        retry_on_lock("update_hotspot_status", self.max_lock_wait_ms, || async {
            // A manual decision is never undone by a later run
            sqlx::query("UPDATE hotspots SET status = ?, archived_by_pipeline = 0, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(&now_str)
                .bind(&id_str)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await?;

        hotspot.status = status;
        hotspot.updated_at = now;
        Ok(hotspot)
    }

    async fn count_hotspots(&self, scope: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hotspots WHERE scope = ?")
            .bind(scope)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
