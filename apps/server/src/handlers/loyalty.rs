//! # Loyalty Tier Handlers
//!
//! Every mutation re-resolves all customers' cached tiers before it
//! commits, so a threshold change shows up on customers immediately.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tally_core::{LoyaltyTier, LoyaltyTierUpdate, NewLoyaltyTier, Permission};

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::state::AppState;

/// Public: storefront screens show the tier ladder.
pub async fn list_tiers(State(state): State<AppState>) -> ApiResult<Json<Vec<LoyaltyTier>>> {
    Ok(Json(state.db.loyalty_tiers().list_active().await?))
}

pub async fn create_tier(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewLoyaltyTier>,
) -> ApiResult<(StatusCode, Json<LoyaltyTier>)> {
    actor.require(&state, Permission::LoyaltyTiersManage).await?;
    let tier = state.db.loyalty_tiers().create(&input).await?;
    Ok((StatusCode::CREATED, Json(tier)))
}

pub async fn update_tier(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(input): Json<LoyaltyTierUpdate>,
) -> ApiResult<Json<LoyaltyTier>> {
    actor.require(&state, Permission::LoyaltyTiersManage).await?;
    Ok(Json(state.db.loyalty_tiers().update(id, &input).await?))
}

pub async fn deactivate_tier(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    actor.require(&state, Permission::LoyaltyTiersManage).await?;
    state.db.loyalty_tiers().deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
