// SPDX-License-Identifier: MIT
//! Post-event matching results: the aggregation pass that turns raw
//! telemetry into per-participant rankings and detail blocks, and the
//! storage of the generated document.

pub mod aggregate;
pub mod model;
pub mod storage;

pub use model::ResultsDocument;
pub use storage::ResultsStorage;

use chrono::Utc;

use crate::{error::AppError, identity::Caller, AppContext};

/// Run the aggregation for an event and upsert the results document.
///
/// Invoked when an event's status transitions to "published". Re-running
/// recomputes and replaces the stored document (last writer wins) — it is
/// never additive.
pub async fn generate_and_store(
    ctx: &AppContext,
    event_id: &str,
) -> Result<ResultsDocument, AppError> {
    let assignments = ctx.storage.list_assignments(event_id).await?;
    if assignments.is_empty() {
        return Err(AppError::NoParticipants);
    }

    let hr = ctx.telemetry.hr_samples(event_id).await?;
    let peers = ctx.telemetry.peer_samples(event_id).await?;

    let generated_at_ms = Utc::now().timestamp_millis();
    let doc = aggregate::generate(&assignments, &hr, &peers, generated_at_ms);

    ctx.results.upsert_final(event_id, &doc).await?;
    tracing::info!(
        event_id,
        participants = doc.per_participant.len(),
        "results generated"
    );
    Ok(doc)
}

/// Read an event's stored results. Admins can read any event; participants
/// only events they are assigned to. An event that has not been published
/// yet has no document.
pub async fn get_results(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
) -> Result<ResultsDocument, AppError> {
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    if !caller.is_admin() {
        ctx.storage
            .assignment_for_participant(event_id, &caller.user_id)
            .await?
            .ok_or(AppError::NotFound("event"))?;
    }
    ctx.results
        .get_final(event_id)
        .await?
        .ok_or(AppError::NotFound("results"))
}
