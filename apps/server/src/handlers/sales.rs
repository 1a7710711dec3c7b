//! # Sale Handlers
//!
//! `POST /api/sales` is the settlement entry point. The till signs in as
//! the cashier, so the acting user and `cashierId` must be the same person:
//! ```text
//!   x-user-id resolves to an active user? ── no ──► 401
//!        │ yes
//!   actor == body.cashierId?               ── no ──► 403, nothing attempted
//!        │ yes
//!   actor holds sales:create?              ── no ──► 403, nothing attempted
//!        │ yes
//!        ▼
//!   db.sales().settle(request, policy)   (one transaction)
//!        │ committed
//!        ▼
//!   notifier.publish(sale_created)       (best effort)
//!        │
//!        ▼
//!   201 SaleWithRelations
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tally_core::{Permission, Sale, SaleWithRelations, SettleRequest};
use tally_events::ChangeEvent;
use tracing::{debug, warn};

use super::ListQuery;
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn create_sale(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<SettleRequest>,
) -> ApiResult<(StatusCode, Json<SaleWithRelations>)> {
    if actor.id() != request.cashier_id {
        warn!(actor_id = actor.id(), cashier_id = request.cashier_id, "Settlement for another cashier refused");
        return Err(ApiError::forbidden("cashierId must be the signed-in user"));
    }
    actor.require(&state, Permission::SalesCreate).await?;

    let sale = state.db.sales().settle(&request, &state.policy).await?;

    let reached = state.notifier.publish(ChangeEvent::sale_created(sale.clone()));
    debug!(sale_id = sale.sale.id, observers = reached, "sale_created published");

    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    actor.require(&state, Permission::SalesRead).await?;
    Ok(Json(state.db.sales().list_recent(query.limit()).await?))
}

pub async fn get_sale(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<Json<SaleWithRelations>> {
    actor.require(&state, Permission::SalesRead).await?;
    state
        .db
        .sales()
        .get_with_relations(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", id))
}
