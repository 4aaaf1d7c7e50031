// rest/routes/profiles.rs — own-profile and user administration routes.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::AppError,
    identity::Caller,
    profiles::{self, ProfileInput},
    storage::ProfileRow,
    AppContext,
};

fn profile_json(p: &ProfileRow) -> Value {
    json!({
        "id": p.id,
        "nickname": p.nickname,
        "gender": p.gender,
        "bio": p.bio,
        "role": p.role,
        "createdAt": p.created_at,
        "updatedAt": p.updated_at,
    })
}

pub async fn get_profile(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
) -> Result<Json<Value>, AppError> {
    let profile = profiles::get_own_profile(&ctx, &caller).await?;
    Ok(Json(profile_json(&profile)))
}

pub async fn update_profile(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Json(input): Json<ProfileInput>,
) -> Result<Json<Value>, AppError> {
    let profile = profiles::update_own_profile(&ctx, &caller, &input).await?;
    Ok(Json(profile_json(&profile)))
}

pub async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
) -> Result<Json<Value>, AppError> {
    let list: Vec<Value> = profiles::list_users(&ctx, &caller)
        .await?
        .iter()
        .map(profile_json)
        .collect();
    Ok(Json(json!({ "users": list })))
}

pub async fn toggle_role(
    State(ctx): State<Arc<AppContext>>,
    caller: Caller,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let profile = profiles::toggle_user_role(&ctx, &caller, &user_id).await?;
    Ok(Json(profile_json(&profile)))
}
