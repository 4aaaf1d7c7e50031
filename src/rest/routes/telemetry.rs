// rest/routes/telemetry.rs — the device-facing ingestion route.

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{error::AppError, telemetry, telemetry::TelemetryRequest, AppContext};

/// The body is taken as raw JSON and decoded by hand so that shape errors
/// surface as the same `InvalidInput` payload as range violations, instead
/// of the framework's plain-text rejection.
pub async fn ingest_sample(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let req: TelemetryRequest =
        serde_json::from_value(body).map_err(|e| AppError::InvalidInput {
            violations: vec![e.to_string()],
        })?;
    let ack = telemetry::ingest(&ctx, req).await?;
    Ok(Json(json!({ "success": true, "data": ack })))
}
