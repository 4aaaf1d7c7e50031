//! Participant profiles and role administration.

use serde::Deserialize;
use tracing::info;

use crate::{error::AppError, identity::Caller, storage::ProfileRow, AppContext};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
}

pub async fn get_own_profile(ctx: &AppContext, caller: &Caller) -> Result<ProfileRow, AppError> {
    ctx.storage
        .get_profile(&caller.user_id)
        .await?
        .ok_or(AppError::NotFound("profile"))
}

pub async fn update_own_profile(
    ctx: &AppContext,
    caller: &Caller,
    input: &ProfileInput,
) -> Result<ProfileRow, AppError> {
    ctx.storage
        .update_profile(
            &caller.user_id,
            input.nickname.as_deref(),
            input.gender.as_deref(),
            input.bio.as_deref(),
        )
        .await?;
    get_own_profile(ctx, caller).await
}

pub async fn list_users(ctx: &AppContext, caller: &Caller) -> Result<Vec<ProfileRow>, AppError> {
    caller.require_admin()?;
    Ok(ctx.storage.list_profiles().await?)
}

/// Toggle a user between 'admin' and 'user'. Changing one's own role is a
/// silent no-op, so an administrator cannot lock themselves out.
pub async fn toggle_user_role(
    ctx: &AppContext,
    caller: &Caller,
    user_id: &str,
) -> Result<ProfileRow, AppError> {
    caller.require_admin()?;
    let profile = ctx
        .storage
        .get_profile(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    if user_id == caller.user_id {
        return Ok(profile);
    }
    let new_role = if profile.role == "admin" { "user" } else { "admin" };
    ctx.storage.set_role(user_id, new_role).await?;
    info!(user_id, role = new_role, "user role changed");
    ctx.storage
        .get_profile(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))
}
