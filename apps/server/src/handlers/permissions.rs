//! # Permission Handlers
//!
//! `POST /api/permissions/check` is ungated: it answers questions, it does
//! not grant anything.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::{NewPermissionTemplate, Permission, PermissionCheck, PermissionTemplateWithRules, User};
use tracing::info;

use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAssignment {
    /// `null` removes the user's template.
    pub template_id: Option<i64>,
}

pub async fn check(
    State(state): State<AppState>,
    Json(check): Json<PermissionCheck>,
) -> ApiResult<Json<CheckResponse>> {
    let allowed = state
        .db
        .permissions()
        .is_allowed(
            check.user_id,
            check.resource.trim(),
            check.action.trim(),
            check.field.as_deref(),
        )
        .await?;
    Ok(Json(CheckResponse { allowed }))
}

pub async fn list_templates(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Json<Vec<PermissionTemplateWithRules>>> {
    actor.require(&state, Permission::PermissionTemplatesManage).await?;
    Ok(Json(state.db.permissions().list_templates().await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<NewPermissionTemplate>,
) -> ApiResult<(StatusCode, Json<PermissionTemplateWithRules>)> {
    actor.require(&state, Permission::PermissionTemplatesManage).await?;
    let template = state.db.permissions().create_template(&input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn delete_template(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    actor.require(&state, Permission::PermissionTemplatesManage).await?;
    state.db.permissions().delete_template(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_template(
    State(state): State<AppState>,
    actor: Actor,
    Path(user_id): Path<i64>,
    Json(assignment): Json<TemplateAssignment>,
) -> ApiResult<Json<User>> {
    actor.require(&state, Permission::PermissionTemplatesAssign).await?;

    if let Some(template_id) = assignment.template_id {
        if state.db.permissions().get_template(template_id).await?.is_none() {
            return Err(ApiError::not_found("PermissionTemplate", template_id));
        }
    }

    let user = state
        .db
        .users()
        .assign_template(user_id, assignment.template_id)
        .await?;
    info!(user_id, template_id = ?assignment.template_id, actor_id = actor.id(), "Template assigned");
    Ok(Json(user))
}
