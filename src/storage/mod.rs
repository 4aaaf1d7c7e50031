//! Central SQLite storage — profiles, events, devices, and device
//! assignments. Telemetry and results live in their own storage types
//! (`telemetry::storage`, `results::storage`) sharing this pool.

use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    /// 'admin' | 'user'
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub starts_at_ms: i64,
    pub ends_at_ms: i64,
    /// 'preparing' | 'active' | 'interval' | 'ended' | 'published'
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceRow {
    pub id: String,
    pub note: Option<String>,
    pub registered_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssignmentRow {
    pub event_id: String,
    pub participant_id: String,
    pub device_id: String,
    pub assigned_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it
    /// are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("lovesports.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    /// Used to create TelemetryStorage / ResultsStorage over the same database.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        let stmts = [
            "CREATE TABLE IF NOT EXISTS profiles (
                id          TEXT PRIMARY KEY,
                nickname    TEXT,
                gender      TEXT,
                bio         TEXT,
                role        TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS events (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                starts_at_ms  INTEGER NOT NULL,
                ends_at_ms    INTEGER NOT NULL,
                status        TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS devices (
                id             TEXT PRIMARY KEY,
                note           TEXT,
                registered_at  TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS device_assignments (
                event_id        TEXT NOT NULL REFERENCES events(id),
                participant_id  TEXT NOT NULL REFERENCES profiles(id),
                device_id       TEXT NOT NULL REFERENCES devices(id),
                assigned_at     TEXT NOT NULL,
                UNIQUE (event_id, participant_id),
                UNIQUE (event_id, device_id)
            )",
            "CREATE TABLE IF NOT EXISTS telemetry (
                event_id        TEXT NOT NULL REFERENCES events(id),
                device_id       TEXT NOT NULL REFERENCES devices(id),
                timestamp_ms    INTEGER NOT NULL,
                heart_rate_bpm  INTEGER,
                battery_pct     INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS telemetry_event_device_timestamp_idx
                ON telemetry (event_id, device_id, timestamp_ms)",
            "CREATE TABLE IF NOT EXISTS telemetry_peers (
                event_id        TEXT NOT NULL REFERENCES events(id),
                device_id       TEXT NOT NULL REFERENCES devices(id),
                peer_device_id  TEXT NOT NULL,
                timestamp_ms    INTEGER NOT NULL,
                distance_m      INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS telemetry_peers_event_device_timestamp_idx
                ON telemetry_peers (event_id, device_id, timestamp_ms)",
            "CREATE INDEX IF NOT EXISTS telemetry_peers_event_peer_timestamp_idx
                ON telemetry_peers (event_id, peer_device_id, timestamp_ms)",
            "CREATE TABLE IF NOT EXISTS results_final (
                event_id              TEXT PRIMARY KEY REFERENCES events(id),
                generated_at_ms       INTEGER NOT NULL,
                per_participant_json  TEXT NOT NULL
            )",
        ];
        for stmt in stmts {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .context("failed to run schema bootstrap")?;
        }
        Ok(())
    }

    // ─── Profiles ───────────────────────────────────────────────────────────

    /// Insert a default-role profile row for an upstream-authenticated user
    /// id the first time it is seen. No-op if the profile already exists.
    pub async fn ensure_profile(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO profiles (id, role, created_at, updated_at)
             VALUES (?, 'user', ?, ?)",
        )
        .bind(id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        Ok(sqlx::query_as("SELECT * FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_profiles(&self) -> Result<Vec<ProfileRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM profiles ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn update_profile(
        &self,
        id: &str,
        nickname: Option<&str>,
        gender: Option<&str>,
        bio: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE profiles SET nickname = ?, gender = ?, bio = ?, updated_at = ? WHERE id = ?",
        )
        .bind(nickname)
        .bind(gender)
        .bind(bio)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_role(&self, id: &str, role: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Events ─────────────────────────────────────────────────────────────

    pub async fn create_event(
        &self,
        name: &str,
        starts_at_ms: i64,
        ends_at_ms: i64,
    ) -> Result<EventRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO events (id, name, starts_at_ms, ends_at_ms, status, created_at)
             VALUES (?, ?, ?, ?, 'preparing', ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(starts_at_ms)
        .bind(ends_at_ms)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_event(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("event not found after insert"))
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<EventRow>> {
        Ok(sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_events(&self) -> Result<Vec<EventRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM events ORDER BY starts_at_ms DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn update_event(
        &self,
        id: &str,
        name: &str,
        starts_at_ms: i64,
        ends_at_ms: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE events SET name = ?, starts_at_ms = ?, ends_at_ms = ? WHERE id = ?")
            .bind(name)
            .bind(starts_at_ms)
            .bind(ends_at_ms)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_event_status(&self, id: &str, status: &str) -> Result<()> {
        sqlx::query("UPDATE events SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Devices ────────────────────────────────────────────────────────────

    pub async fn create_device(&self, id: &str, note: Option<&str>) -> Result<DeviceRow> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO devices (id, note, registered_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(note)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        self.get_device(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("device not found after insert"))
    }

    pub async fn get_device(&self, id: &str) -> Result<Option<DeviceRow>> {
        Ok(sqlx::query_as("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM devices ORDER BY registered_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// True while any assignment links the device to an event that has not
    /// ended ('preparing', 'active', 'interval'). Such devices must not be
    /// deleted.
    pub async fn device_has_live_assignment(&self, device_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM device_assignments da
               JOIN events e ON e.id = da.event_id
              WHERE da.device_id = ?
                AND e.status IN ('preparing', 'active', 'interval')",
        )
        .bind(device_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Delete a device together with its assignments.
    pub async fn delete_device(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM device_assignments WHERE device_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ─── Device assignments ─────────────────────────────────────────────────

    pub async fn create_assignment(
        &self,
        event_id: &str,
        participant_id: &str,
        device_id: &str,
    ) -> Result<AssignmentRow> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO device_assignments (event_id, participant_id, device_id, assigned_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(event_id)
        .bind(participant_id)
        .bind(device_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(AssignmentRow {
            event_id: event_id.to_string(),
            participant_id: participant_id.to_string(),
            device_id: device_id.to_string(),
            assigned_at: now,
        })
    }

    pub async fn delete_assignment(&self, event_id: &str, device_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM device_assignments WHERE event_id = ? AND device_id = ?")
            .bind(event_id)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All assignments for an event in assignment order. This order is the
    /// roster order used as the deterministic tie-break in result rankings.
    pub async fn list_assignments(&self, event_id: &str) -> Result<Vec<AssignmentRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM device_assignments WHERE event_id = ?
              ORDER BY assigned_at ASC, participant_id ASC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The most recently created assignment for a device, across all events.
    /// Ingestion resolves the owning event through this.
    pub async fn latest_assignment_for_device(
        &self,
        device_id: &str,
    ) -> Result<Option<AssignmentRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM device_assignments WHERE device_id = ?
              ORDER BY assigned_at DESC LIMIT 1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn assignment_for_participant(
        &self,
        event_id: &str,
        participant_id: &str,
    ) -> Result<Option<AssignmentRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM device_assignments WHERE event_id = ? AND participant_id = ?",
        )
        .bind(event_id)
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
