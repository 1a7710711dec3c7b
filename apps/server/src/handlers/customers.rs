//! # Customer Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tally_core::{CoreError, Customer, NewCustomer, Permission, PointsAdjustment, Sale};
use tally_db::RepoError;
use tally_events::ChangeEvent;
use tracing::info;

use super::ListQuery;
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_customers(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    actor.require(&state, Permission::CustomersRead).await?;
    Ok(Json(state.db.customers().list(query.limit()).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    actor.require(&state, Permission::CustomersCreate).await?;
    let customer = state.db.customers().create(&input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<Json<Customer>> {
    actor.require(&state, Permission::CustomersRead).await?;
    state
        .db
        .customers()
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Customer", id))
}

pub async fn customer_sales(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    actor.require(&state, Permission::CustomersRead).await?;
    if state.db.customers().get_by_id(id).await?.is_none() {
        return Err(ApiError::not_found("Customer", id));
    }
    Ok(Json(state.db.sales().list_for_customer(id, query.limit()).await?))
}

/// Administrative point adjustment; the tier is re-resolved in the same
/// transaction.
pub async fn adjust_points(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(adjustment): Json<PointsAdjustment>,
) -> ApiResult<Json<Customer>> {
    actor.require(&state, Permission::CustomersAdjustPoints).await?;

    let customer = state
        .db
        .customers()
        .adjust_points(id, &adjustment)
        .await
        .map_err(|e| match e {
            RepoError::Rejected(CoreError::CustomerNotFound(id)) => ApiError::not_found("Customer", id),
            other => other.into(),
        })?;

    info!(
        customer_id = id,
        actor_id = actor.id(),
        delta = adjustment.delta,
        reason = ?adjustment.reason,
        "Points adjusted"
    );
    state.notifier.publish(ChangeEvent::customer_updated(customer.clone()));

    Ok(Json(customer))
}
