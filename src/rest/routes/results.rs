// rest/routes/results.rs — the published results document.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{error::AppError, identity::Caller, results, AppContext};

pub async fn get_results(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(event_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doc = results::get_results(&ctx, &caller, &event_id).await?;
    Ok(Json(json!(doc)))
}
