//! Handlers for the caller's own user record

use axum::{extract::State, Json};
use prethesis_common::{
    access::ThesisView,
    auth::Actor,
    db::{models::User, views::ThesisData, Repository},
    errors::{AppError, Result},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub language: String,
    pub is_admin: bool,
    pub is_external: bool,
    pub iam_groups: serde_json::Value,
    pub favorite_program_ids: Option<serde_json::Value>,
    pub department_id: Option<String>,
    pub theses_table_filters: serde_json::Value,
    pub managed_program_ids: Vec<String>,
}

impl UserResponse {
    fn new(user: User, actor: &Actor) -> Self {
        let managed_program_ids = actor
            .role
            .managed_program_ids()
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        Self {
            is_admin: actor.is_admin(),
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            language: user.language,
            is_external: user.is_external,
            iam_groups: user.iam_groups,
            favorite_program_ids: user.favorite_program_ids,
            department_id: user.department_id,
            theses_table_filters: user.theses_table_filters,
            managed_program_ids,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub department_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteProgramsRequest {
    #[validate(length(max = 200))]
    pub favorite_program_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesesTableFiltersRequest {
    pub theses_table_filters: serde_json::Value,
}

/// The caller with their managed programs
pub async fn get_user(actor: Actor) -> Json<UserResponse> {
    let user = actor.user.clone();
    Json(UserResponse::new(user, &actor))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    request.validate().map_err(AppError::from_validation)?;

    let repo = Repository::new(state.db.clone());
    let user = repo.set_department(actor.user.clone(), request.department_id).await?;

    tracing::info!(user_id = %user.id, "User department updated");
    Ok(Json(UserResponse::new(user, &actor)))
}

/// "My theses": theses the caller supervises
pub async fn list_supervised_theses(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<Vec<ThesisData>>> {
    let theses = state.theses().list(&actor, ThesisView::Supervised).await?;
    Ok(Json(theses))
}

pub async fn update_favorite_programs(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<FavoriteProgramsRequest>,
) -> Result<Json<UserResponse>> {
    request.validate().map_err(AppError::from_validation)?;

    let repo = Repository::new(state.db.clone());
    let user = repo
        .set_favorite_programs(actor.user.clone(), request.favorite_program_ids)
        .await?;

    Ok(Json(UserResponse::new(user, &actor)))
}

pub async fn update_theses_table_filters(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<ThesesTableFiltersRequest>,
) -> Result<Json<UserResponse>> {
    if !request.theses_table_filters.is_object() {
        return Err(AppError::validation(
            "thesesTableFilters",
            "Table filters must be an object",
        ));
    }

    let repo = Repository::new(state.db.clone());
    let user = repo
        .set_theses_table_filters(actor.user.clone(), request.theses_table_filters)
        .await?;

    Ok(Json(UserResponse::new(user, &actor)))
}
