// SPDX-License-Identifier: MIT
//! Persistence of generated result documents — one `results_final` row per
//! event, overwritten whole on every aggregation run.

use anyhow::{Context as _, Result};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::results::model::{ParticipantResult, ResultsDocument};

pub struct ResultsStorage {
    pool: SqlitePool,
}

impl ResultsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the event's results document. Last writer wins.
    pub async fn upsert_final(&self, event_id: &str, doc: &ResultsDocument) -> Result<()> {
        let per_participant_json = serde_json::to_string(&doc.per_participant)
            .context("serialize per-participant results")?;
        sqlx::query(
            "INSERT INTO results_final (event_id, generated_at_ms, per_participant_json)
             VALUES (?, ?, ?)
             ON CONFLICT(event_id) DO UPDATE SET
               generated_at_ms = excluded.generated_at_ms,
               per_participant_json = excluded.per_participant_json",
        )
        .bind(event_id)
        .bind(doc.generated_at_ms)
        .bind(&per_participant_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_final(&self, event_id: &str) -> Result<Option<ResultsDocument>> {
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT generated_at_ms, per_participant_json FROM results_final WHERE event_id = ?",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some((generated_at_ms, json)) => {
                let per_participant: BTreeMap<String, ParticipantResult> =
                    serde_json::from_str(&json).context("parse stored results document")?;
                Ok(Some(ResultsDocument {
                    generated_at_ms,
                    per_participant,
                }))
            }
            None => Ok(None),
        }
    }
}
