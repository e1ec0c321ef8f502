use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewUser, ProfileUpdate, User};
use crate::state::AppState;

// POST /users
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserRequest {
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub schedule: Option<serde_json::Value>,
    pub picture: Option<String>,
}

pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let email = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".to_string()))?
        .to_string();

    let new_user = NewUser {
        company_name: body.company_name,
        phone: body.phone,
        email,
        schedule: body.schedule,
        picture: body.picture,
    };

    let user = {
        let db = state.db.lock().unwrap();
        queries::create_user(&db, &new_user)?
    };

    tracing::info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

// GET /users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, AppError> {
    let db = state.db.lock().unwrap();
    Ok(Json(queries::list_users(&db)?))
}

// GET /users/:id
pub async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    id: Option<Path<String>>,
) -> Result<Json<User>, AppError> {
    let id = id
        .map(|Path(id)| id)
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("No id provided".to_string()))?;

    let db = state.db.lock().unwrap();
    queries::get_user(&db, id.trim())?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

// GET /user
pub async fn get_current_user(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

// PUT /user
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    if body.is_empty() {
        return Ok(Json(user));
    }

    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_profile(&db, &user.id, &body)?
    };

    updated
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
