// rest/routes/devices.rs — device registry and assignment routes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    devices::{self, AssignDeviceInput, RegisterDeviceInput},
    error::AppError,
    identity::Caller,
    storage::{AssignmentRow, DeviceRow},
    AppContext,
};

fn device_json(d: &DeviceRow) -> Value {
    json!({
        "id": d.id,
        "note": d.note,
        "registeredAt": d.registered_at,
    })
}

fn assignment_json(a: &AssignmentRow) -> Value {
    json!({
        "eventId": a.event_id,
        "participantId": a.participant_id,
        "deviceId": a.device_id,
        "assignedAt": a.assigned_at,
    })
}

pub async fn list_devices(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
) -> Result<Json<Value>, AppError> {
    let list: Vec<Value> = devices::list_devices(&ctx, &caller)
        .await?
        .iter()
        .map(|(device, assignment)| {
            let mut v = device_json(device);
            v["assignment"] = match assignment {
                Some(a) => assignment_json(a),
                None => Value::Null,
            };
            v
        })
        .collect();
    Ok(Json(json!({ "devices": list })))
}

pub async fn register_device(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Json(input): Json<RegisterDeviceInput>,
) -> Result<Json<Value>, AppError> {
    let device = devices::register_device(&ctx, &caller, &input).await?;
    Ok(Json(device_json(&device)))
}

pub async fn delete_device(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    devices::delete_device(&ctx, &caller, &id).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn list_assignments(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let list: Vec<Value> = devices::list_assignments(&ctx, &caller, &event_id)
        .await?
        .iter()
        .map(assignment_json)
        .collect();
    Ok(Json(json!({ "assignments": list })))
}

pub async fn assign_device(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(event_id): Path<String>,
    Json(input): Json<AssignDeviceInput>,
) -> Result<Json<Value>, AppError> {
    let assignment = devices::assign_device(&ctx, &caller, &event_id, &input).await?;
    Ok(Json(assignment_json(&assignment)))
}

pub async fn unassign_device(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path((event_id, device_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    devices::unassign_device(&ctx, &caller, &event_id, &device_id).await?;
    Ok(Json(json!({ "deleted": device_id })))
}
