//! The ingestion operation: validate, resolve the device's current
//! assignment, persist one heart-rate row and one peer-distance row
//! atomically.
//!
//! No authentication is applied here — the endpoint trusts the caller to
//! present a real device id. That open trust boundary matches the deployed
//! behavior and is flagged in DESIGN.md rather than silently closed.

use chrono::Utc;
use tracing::debug;

use crate::{
    error::AppError,
    telemetry::model::{TelemetryAck, TelemetryRequest},
    AppContext,
};

pub async fn ingest(ctx: &AppContext, req: TelemetryRequest) -> Result<TelemetryAck, AppError> {
    let violations = req.validate();
    if !violations.is_empty() {
        return Err(AppError::InvalidInput { violations });
    }

    // The device's most recent assignment decides which event owns the
    // sample. A device that was never assigned has no event to write into.
    let assignment = ctx
        .storage
        .latest_assignment_for_device(&req.device_id)
        .await?
        .ok_or_else(|| AppError::UnknownDevice {
            device_id: req.device_id.clone(),
        })?;

    let timestamp_ms = Utc::now().timestamp_millis();
    let heart_rate = req.heart_rate.round() as i64;
    let distance = req.distance.round() as i64;

    ctx.telemetry
        .insert_sample_pair(
            &assignment.event_id,
            &assignment.device_id,
            &req.nearby_device_id,
            timestamp_ms,
            heart_rate,
            distance,
        )
        .await?;

    debug!(
        event_id = %assignment.event_id,
        device_id = %assignment.device_id,
        heart_rate,
        distance,
        "telemetry sample stored"
    );

    Ok(TelemetryAck {
        event_id: assignment.event_id,
        device_id: assignment.device_id,
        timestamp_ms,
        heart_rate,
        nearby_device_id: req.nearby_device_id,
        distance,
    })
}
