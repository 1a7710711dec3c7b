//! # Request Actor & Permission Gate
//!
//! Administrative requests name their acting user in the `x-user-id`
//! header. The gate asks the permission model before any operation runs.
//!
//! ```text
//!   x-user-id: 2
//!        │
//!        ▼
//!   Actor extractor ── missing / not a number / unknown / inactive ─► 401
//!        │
//!        ▼
//!   require(actor, Permission::ProductsCreate) ── denied ─► 403
//!        │
//!        ▼
//!   operation
//! ```

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tally_core::{Permission, User};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl FromRequestParts<AppState> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("{} header is required", USER_HEADER)))?;

        let user_id: i64 = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| ApiError::unauthorized(format!("{} must be a user id", USER_HEADER)))?;

        match state.db.users().get_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(Actor(user)),
            _ => {
                warn!(user_id, uri = %parts.uri, "Request from unknown or inactive user");
                Err(ApiError::unauthorized("Unknown or inactive user"))
            }
        }
    }
}

/// Fails with 403 unless `user_id` holds `permission`.
pub async fn require(state: &AppState, user_id: i64, permission: Permission) -> ApiResult<()> {
    if state.db.permissions().is_permitted(user_id, permission, None).await? {
        return Ok(());
    }

    warn!(user_id, permission = %permission, "Permission denied");
    Err(ApiError::forbidden(format!("Missing permission {}", permission)))
}

impl Actor {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// [`require`] for this actor.
    pub async fn require(&self, state: &AppState, permission: Permission) -> ApiResult<()> {
        require(state, self.id(), permission).await
    }
}
