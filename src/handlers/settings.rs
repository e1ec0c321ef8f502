use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

// GET /user/settings
pub async fn get_settings(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(user.settings)
}

// PUT /user/settings
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: Option<serde_json::Value>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let settings = body
        .settings
        .ok_or_else(|| AppError::Validation("settings is required".to_string()))?;

    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_settings(&db, &user.id, &settings)?
    };

    updated
        .map(|u| Json(u.settings))
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
