//! # Product Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tally_core::{NewProduct, Permission, Product};

use super::ListQuery;
use crate::auth::Actor;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub price_cents: i64,
}

/// Active products whose name or SKU contains `q` (all of them when empty).
pub async fn list_products(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    actor.require(&state, Permission::ProductsRead).await?;
    Ok(Json(state.db.products().search(&query.q, ListQuery { limit: query.limit }.limit()).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    actor.require(&state, Permission::ProductsCreate).await?;
    let product = state.db.products().create(&input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_price(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(update): Json<PriceUpdate>,
) -> ApiResult<Json<Product>> {
    actor.require(&state, Permission::ProductsUpdate).await?;
    Ok(Json(state.db.products().update_price(id, update.price_cents).await?))
}

pub async fn deactivate_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    actor.require(&state, Permission::ProductsUpdate).await?;
    state.db.products().deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
