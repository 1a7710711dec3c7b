//! # User Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tally_core::{NewUser, Permission, User};

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<User>>> {
    actor.require(&state, Permission::UsersRead).await?;
    Ok(Json(state.db.users().list().await?))
}

/// Without an explicit template the user gets their role's default one.
pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    actor.require(&state, Permission::UsersCreate).await?;
    let user = state.db.users().create(&input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
