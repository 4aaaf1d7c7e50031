//! Device registry and assignment administration.

use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    events::EventStatus,
    identity::Caller,
    storage::{AssignmentRow, DeviceRow},
    AppContext,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceInput {
    pub device_id: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDeviceInput {
    pub participant_id: String,
    pub device_id: String,
}

/// Map a racing unique-index violation to `Conflict`; everything else is a
/// storage failure. The select-then-insert checks above it catch the common
/// case with a better message.
fn conflict_on_unique(e: anyhow::Error, message: &str) -> AppError {
    match e.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Storage(e),
    }
}

pub async fn register_device(
    ctx: &AppContext,
    caller: &Caller,
    input: &RegisterDeviceInput,
) -> Result<DeviceRow, AppError> {
    caller.require_admin()?;
    if input.device_id.trim().is_empty() {
        return Err(AppError::InvalidInput {
            violations: vec!["deviceId must not be empty".to_string()],
        });
    }
    if ctx.storage.get_device(&input.device_id).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "device '{}' is already registered",
            input.device_id
        )));
    }
    let device = ctx
        .storage
        .create_device(&input.device_id, input.note.as_deref())
        .await
        .map_err(|e| conflict_on_unique(e, "device is already registered"))?;
    info!(device_id = %device.id, "device registered");
    Ok(device)
}

/// Every registered device together with its most recent assignment, the
/// way the admin device list renders them.
pub async fn list_devices(
    ctx: &AppContext,
    caller: &Caller,
) -> Result<Vec<(DeviceRow, Option<AssignmentRow>)>, AppError> {
    caller.require_admin()?;
    let mut out = Vec::new();
    for device in ctx.storage.list_devices().await? {
        let assignment = ctx.storage.latest_assignment_for_device(&device.id).await?;
        out.push((device, assignment));
    }
    Ok(out)
}

/// A device assigned to an event that has not ended cannot be removed;
/// deleting an eligible device also drops its assignment history.
pub async fn delete_device(
    ctx: &AppContext,
    caller: &Caller,
    device_id: &str,
) -> Result<(), AppError> {
    caller.require_admin()?;
    ctx.storage
        .get_device(device_id)
        .await?
        .ok_or(AppError::NotFound("device"))?;
    if ctx.storage.device_has_live_assignment(device_id).await? {
        return Err(AppError::DeviceInUse);
    }
    ctx.storage.delete_device(device_id).await?;
    info!(device_id, "device deleted");
    Ok(())
}

pub async fn assign_device(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
    input: &AssignDeviceInput,
) -> Result<AssignmentRow, AppError> {
    caller.require_admin()?;
    let event = ctx
        .storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    match EventStatus::parse(&event.status) {
        Some(EventStatus::Ended) | Some(EventStatus::Published) => {
            return Err(AppError::Conflict(
                "devices cannot be assigned to a finished event".to_string(),
            ));
        }
        _ => {}
    }
    ctx.storage
        .get_device(&input.device_id)
        .await?
        .ok_or(AppError::NotFound("device"))?;
    ctx.storage
        .get_profile(&input.participant_id)
        .await?
        .ok_or(AppError::NotFound("participant"))?;

    let assignment = ctx
        .storage
        .create_assignment(event_id, &input.participant_id, &input.device_id)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                "participant or device already holds an assignment for this event",
            )
        })?;
    info!(
        event_id,
        participant_id = %assignment.participant_id,
        device_id = %assignment.device_id,
        "device assigned"
    );
    Ok(assignment)
}

pub async fn unassign_device(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
    device_id: &str,
) -> Result<(), AppError> {
    caller.require_admin()?;
    ctx.storage.delete_assignment(event_id, device_id).await?;
    info!(event_id, device_id, "device unassigned");
    Ok(())
}

pub async fn list_assignments(
    ctx: &AppContext,
    caller: &Caller,
    event_id: &str,
) -> Result<Vec<AssignmentRow>, AppError> {
    caller.require_admin()?;
    ctx.storage
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    Ok(ctx.storage.list_assignments(event_id).await?)
}
