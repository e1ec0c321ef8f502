use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::state::AppState;

/// The caller of the current request, loaded fresh from the store.
///
/// Token verification happens upstream; by the time a request reaches this
/// service the caller's id is carried in the configured header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(state.config.auth_user_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let user = {
            let db = state.db.lock().unwrap();
            queries::get_user(&db, user_id)?
        };

        match user {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(user_id = %user_id, "request for unknown user");
                Err(AppError::Unauthorized)
            }
        }
    }
}
