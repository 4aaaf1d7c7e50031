//! Event administration: CRUD plus the status transition that triggers
//! results generation.

use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    identity::Caller,
    results,
    storage::EventRow,
    telemetry::storage::{HrSampleRow, PeerSampleRow},
    AppContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Preparing,
    Active,
    Interval,
    Ended,
    Published,
}

impl EventStatus {
    pub fn parse(s: &str) -> Option<EventStatus> {
        match s {
            "preparing" => Some(EventStatus::Preparing),
            "active" => Some(EventStatus::Active),
            "interval" => Some(EventStatus::Interval),
            "ended" => Some(EventStatus::Ended),
            "published" => Some(EventStatus::Published),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Preparing => "preparing",
            EventStatus::Active => "active",
            EventStatus::Interval => "interval",
            EventStatus::Ended => "ended",
            EventStatus::Published => "published",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub name: String,
    pub starts_at_ms: i64,
    pub ends_at_ms: i64,
}

impl EventInput {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput {
                violations: vec!["name must not be empty".to_string()],
            });
        }
        Ok(())
    }
}

pub async fn create_event(
    ctx: &AppContext,
    caller: &Caller,
    input: &EventInput,
) -> Result<EventRow, AppError> {
    caller.require_admin()?;
    input.validate()?;
    let event = ctx
        .storage
        .create_event(&input.name, input.starts_at_ms, input.ends_at_ms)
        .await?;
    info!(event_id = %event.id, name = %event.name, "event created");
    Ok(event)
}

pub async fn update_event(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
    input: &EventInput,
) -> Result<EventRow, AppError> {
    caller.require_admin()?;
    input.validate()?;
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    ctx.storage
        .update_event(event_id, &input.name, input.starts_at_ms, input.ends_at_ms)
        .await?;
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))
}

pub async fn list_events(ctx: &AppContext, caller: &Caller) -> Result<Vec<EventRow>, AppError> {
    caller.require_admin()?;
    Ok(ctx.storage.list_events().await?)
}

/// Admins can read any event; participants only the events they are
/// assigned to.
pub async fn get_event(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
) -> Result<EventRow, AppError> {
    let event = ctx
        .storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    if !caller.is_admin() {
        ctx.storage
            .assignment_for_participant(event_id, &caller.user_id)
            .await?
            .ok_or(AppError::NotFound("event"))?;
    }
    Ok(event)
}

/// Set an event's status. A transition to "published" runs the results
/// aggregation first; the status only changes once the document has been
/// written, so a published event always has results.
pub async fn set_event_status(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
    status: &str,
) -> Result<EventRow, AppError> {
    caller.require_admin()?;
    let status = EventStatus::parse(status).ok_or_else(|| AppError::InvalidInput {
        violations: vec![format!(
            "status must be one of preparing, active, interval, ended, published (got '{status}')"
        )],
    })?;
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;

    if status == EventStatus::Published {
        results::generate_and_store(ctx, event_id).await?;
    }

    ctx.storage
        .set_event_status(event_id, status.as_str())
        .await?;
    info!(event_id, status = status.as_str(), "event status changed");
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))
}

/// The live telemetry view polled by the admin event page: the full
/// heart-rate series oldest-first plus the hundred most recent peer rows.
pub async fn event_telemetry(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
) -> Result<(Vec<HrSampleRow>, Vec<PeerSampleRow>), AppError> {
    caller.require_admin()?;
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    let hr = ctx.telemetry.hr_samples(event_id).await?;
    let peers = ctx.telemetry.recent_peer_samples(event_id, 100).await?;
    Ok((hr, peers))
}
