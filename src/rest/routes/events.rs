// rest/routes/events.rs — event administration routes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppError,
    events::{self, EventInput},
    identity::Caller,
    storage::EventRow,
    telemetry::storage::{HrSampleRow, PeerSampleRow},
    AppContext,
};

pub(crate) fn event_json(e: &EventRow) -> Value {
    json!({
        "id": e.id,
        "name": e.name,
        "startsAtMs": e.starts_at_ms,
        "endsAtMs": e.ends_at_ms,
        "status": e.status,
        "createdAt": e.created_at,
    })
}

pub async fn list_events(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
) -> Result<Json<Value>, AppError> {
    let list: Vec<Value> = events::list_events(&ctx, &caller)
        .await?
        .iter()
        .map(event_json)
        .collect();
    Ok(Json(json!({ "events": list })))
}

pub async fn create_event(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Json(input): Json<EventInput>,
) -> Result<Json<Value>, AppError> {
    let event = events::create_event(&ctx, &caller, &input).await?;
    Ok(Json(event_json(&event)))
}

pub async fn get_event(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let event = events::get_event(&ctx, &caller, &id).await?;
    Ok(Json(event_json(&event)))
}

pub async fn update_event(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Json<Value>, AppError> {
    let event = events::update_event(&ctx, &caller, &id, &input).await?;
    Ok(Json(event_json(&event)))
}

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_status(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let event = events::set_event_status(&ctx, &caller, &id, &body.status).await?;
    Ok(Json(event_json(&event)))
}

fn hr_json(s: &HrSampleRow) -> Value {
    json!({
        "deviceId": s.device_id,
        "timestampMs": s.timestamp_ms,
        "heartRateBpm": s.heart_rate_bpm,
        "batteryPct": s.battery_pct,
    })
}

fn peer_json(s: &PeerSampleRow) -> Value {
    json!({
        "deviceId": s.device_id,
        "peerDeviceId": s.peer_device_id,
        "timestampMs": s.timestamp_ms,
        "distanceM": s.distance_m,
    })
}

pub async fn event_telemetry(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let (hr, peers) = events::event_telemetry(&ctx, &caller, &id).await?;
    Ok(Json(json!({
        "telemetry": hr.iter().map(hr_json).collect::<Vec<_>>(),
        "telemetryPeers": peers.iter().map(peer_json).collect::<Vec<_>>(),
    })))
}
