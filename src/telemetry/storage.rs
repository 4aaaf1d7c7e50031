//! Telemetry storage — append-only heart-rate and peer-distance rows,
//! sharing the central SQLite pool.

use anyhow::{Context as _, Result};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HrSampleRow {
    pub event_id: String,
    pub device_id: String,
    pub timestamp_ms: i64,
    pub heart_rate_bpm: Option<i64>,
    pub battery_pct: Option<i64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PeerSampleRow {
    pub event_id: String,
    pub device_id: String,
    pub peer_device_id: String,
    pub timestamp_ms: i64,
    pub distance_m: i64,
}

/// Telemetry query + write layer.
pub struct TelemetryStorage {
    pool: SqlitePool,
}

impl TelemetryStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one ingestion call: one heart-rate row and one peer-distance
    /// row with the same timestamp, in a single transaction. Either both
    /// rows become visible or neither does.
    pub async fn insert_sample_pair(
        &self,
        event_id: &str,
        device_id: &str,
        peer_device_id: &str,
        timestamp_ms: i64,
        heart_rate_bpm: i64,
        distance_m: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO telemetry (event_id, device_id, timestamp_ms, heart_rate_bpm, battery_pct)
             VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(event_id)
        .bind(device_id)
        .bind(timestamp_ms)
        .bind(heart_rate_bpm)
        .execute(&mut *tx)
        .await
        .context("insert telemetry row")?;
        sqlx::query(
            "INSERT INTO telemetry_peers (event_id, device_id, peer_device_id, timestamp_ms, distance_m)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(device_id)
        .bind(peer_device_id)
        .bind(timestamp_ms)
        .bind(distance_m)
        .execute(&mut *tx)
        .await
        .context("insert telemetry peer row")?;
        tx.commit().await?;
        Ok(())
    }

    /// All heart-rate rows for an event, oldest first.
    pub async fn hr_samples(&self, event_id: &str) -> Result<Vec<HrSampleRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM telemetry WHERE event_id = ? ORDER BY timestamp_ms ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// All peer-distance rows for an event, oldest first.
    pub async fn peer_samples(&self, event_id: &str) -> Result<Vec<PeerSampleRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM telemetry_peers WHERE event_id = ? ORDER BY timestamp_ms ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Most recent peer-distance rows, newest first. The admin live view
    /// polls this alongside the full heart-rate series.
    pub async fn recent_peer_samples(
        &self,
        event_id: &str,
        limit: i64,
    ) -> Result<Vec<PeerSampleRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM telemetry_peers WHERE event_id = ?
              ORDER BY timestamp_ms DESC LIMIT ?",
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
