use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::db::queries;
use crate::errors::AppError;
use crate::services::payments::{CheckoutMode, CheckoutSession, CheckoutSessionRequest, LineItem};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionResponse {
    pub session: CheckoutSession,
}

// POST /user/subscribe
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SessionResponse>, AppError> {
    let request = CheckoutSessionRequest {
        mode: CheckoutMode::Subscription,
        line_items: vec![LineItem {
            price: state.config.subscription_price_id.clone(),
            quantity: 1,
        }],
        success_url: state.config.subscription_success_url(),
        cancel_url: state.config.subscription_cancel_url(),
    };

    let session = state
        .payments
        .create_checkout_session(&request, None)
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %user.id,
                error = %e,
                kind = ?e.kind,
                status = ?e.status,
                "failed to create subscription checkout session"
            );
            e
        })?;

    // Marked at session creation; the session itself may still be abandoned.
    {
        let db = state.db.lock().unwrap();
        queries::set_subscribed(&db, &user.id, true)?;
    }

    tracing::info!(user_id = %user.id, session_id = %session.id, "subscription checkout created");
    Ok(Json(SessionResponse { session }))
}

// GET /user/subscribed
#[derive(Serialize)]
pub struct SubscribedResponse {
    pub subscribed: bool,
}

pub async fn subscribed(CurrentUser(user): CurrentUser) -> Json<SubscribedResponse> {
    Json(SubscribedResponse {
        subscribed: user.subscribed,
    })
}

// POST /user/checkout
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub quantity: Option<i64>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let price = required(body.price_id, "priceId")?;
    let success_url = required(body.success_url, "successUrl")?;
    let cancel_url = required(body.cancel_url, "cancelUrl")?;
    let quantity = u32::try_from(body.quantity.unwrap_or(1))
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::Validation("quantity must be at least 1".to_string()))?;

    let request = CheckoutSessionRequest {
        mode: CheckoutMode::Payment,
        line_items: vec![LineItem { price, quantity }],
        success_url,
        cancel_url,
    };

    let session = state
        .payments
        .create_checkout_session(&request, user.stripe_account.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %user.id,
                error = %e,
                kind = ?e.kind,
                status = ?e.status,
                "failed to create checkout session"
            );
            e
        })?;

    {
        let db = state.db.lock().unwrap();
        queries::set_subscribed(&db, &user.id, true)?;
    }

    tracing::info!(
        user_id = %user.id,
        session_id = %session.id,
        connected_account = user.stripe_account.as_deref().unwrap_or("platform"),
        "checkout session created"
    );
    Ok(Json(SessionResponse { session }))
}
