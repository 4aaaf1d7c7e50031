//! Resolved caller identity.
//!
//! Session management is delegated to an upstream auth layer, which injects
//! the authenticated user id as the `x-user-id` header. The service resolves
//! the role from `profiles` and threads the resulting [`Caller`] value
//! explicitly through every authorized operation — there is no ambient
//! request context.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use crate::{error::AppError, AppContext};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(s: &str) -> Role {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequestParts<Arc<AppContext>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AppError::Unauthorized)?
            .to_string();

        // First sighting of an upstream-authenticated id creates a
        // default-role profile row.
        ctx.storage.ensure_profile(&user_id).await?;
        let profile = ctx
            .storage
            .get_profile(&user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(Caller {
            user_id,
            role: Role::parse(&profile.role),
        })
    }
}
