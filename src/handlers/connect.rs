use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::db::queries;
use crate::errors::AppError;
use crate::services::payments::{
    AccountLink, AccountLinkRequest, GatewayError, List, PaymentGateway, Product,
};
use crate::state::AppState;

fn log_gateway_error(action: &'static str) -> impl Fn(GatewayError) -> GatewayError {
    move |e| {
        tracing::error!(
            error = %e,
            kind = ?e.kind,
            status = ?e.status,
            "Stripe API call failed while trying to {action}"
        );
        e
    }
}

/// Stripe object ids are `prefix_token` strings; anything else is rejected
/// before it reaches the gateway.
fn is_stripe_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// POST /user/stripe-account
#[derive(Serialize)]
pub struct StripeAccountResponse {
    pub account: String,
    pub linked: bool,
}

pub async fn stripe_account(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StripeAccountResponse>, AppError> {
    if let Some(account) = user.stripe_account {
        return Ok(Json(StripeAccountResponse {
            account,
            linked: true,
        }));
    }

    // Keyed per user so concurrent first requests converge on one account.
    let idempotency_key = format!("connected-account-{}", user.id);
    let account = state
        .payments
        .create_account(Some(&idempotency_key))
        .await
        .map_err(log_gateway_error("create an account"))?;

    let stored = {
        let db = state.db.lock().unwrap();
        if queries::set_stripe_account_if_absent(&db, &user.id, &account.id)? {
            None
        } else {
            queries::get_user(&db, &user.id)?.and_then(|u| u.stripe_account)
        }
    };

    if let Some(existing) = stored {
        tracing::warn!(
            user_id = %user.id,
            created = %account.id,
            existing = %existing,
            "connected account already stored by a concurrent request"
        );
        return Ok(Json(StripeAccountResponse {
            account: existing,
            linked: true,
        }));
    }

    tracing::info!(user_id = %user.id, account = %account.id, "connected account created");
    Ok(Json(StripeAccountResponse {
        account: account.id,
        linked: false,
    }))
}

// POST /user/stripe-account-link
pub async fn stripe_account_link(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Result<Json<AccountLink>, AppError> {
    let account = user.stripe_account.ok_or(AppError::MissingStripeAccount)?;

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().trim_end_matches('/'))
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingOrigin)?;

    let request = AccountLinkRequest {
        return_url: format!("{origin}/return/{account}"),
        refresh_url: format!("{origin}/refresh/{account}"),
        account,
    };

    let link = state
        .payments
        .create_account_link(&request)
        .await
        .map_err(log_gateway_error("create an account link"))?;

    Ok(Json(link))
}

/// Resolves the connected account of the seller `user_id` and confirms it
/// still exists on the gateway.
async fn seller_account(state: &AppState, user_id: &str) -> Result<String, AppError> {
    let seller = {
        let db = state.db.lock().unwrap();
        queries::get_user(&db, user_id)?
    };
    let seller = seller.ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let account_id = seller.stripe_account.ok_or(AppError::MissingStripeAccount)?;

    let account = state
        .payments
        .retrieve_account(&account_id)
        .await
        .map_err(log_gateway_error("retrieve an account"))?;
    Ok(account.id)
}

async fn attach_first_price(
    payments: &dyn PaymentGateway,
    product: &mut Product,
    account: &str,
) -> Result<(), GatewayError> {
    let prices = payments.list_prices(&product.id, account).await?;
    product.prices = prices.data.into_iter().next();
    Ok(())
}

// GET /users/:id/products
pub async fn stripe_products(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<List<Product>>, AppError> {
    let account = seller_account(&state, &user_id).await?;

    let mut products = state
        .payments
        .list_products(&account)
        .await
        .map_err(log_gateway_error("list products"))?;

    for product in &mut products.data {
        attach_first_price(state.payments.as_ref(), product, &account)
            .await
            .map_err(log_gateway_error("list prices"))?;
    }

    Ok(Json(products))
}

// GET /users/:id/products/:product_id
pub async fn stripe_product(
    State(state): State<Arc<AppState>>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<Product>, AppError> {
    if !is_stripe_id(&product_id) {
        return Err(AppError::Validation("Invalid product id".to_string()));
    }

    let account = seller_account(&state, &user_id).await?;

    let mut product = state
        .payments
        .retrieve_product(&product_id, &account)
        .await
        .map_err(log_gateway_error("retrieve a product"))?;

    attach_first_price(state.payments.as_ref(), &mut product, &account)
        .await
        .map_err(log_gateway_error("list prices"))?;

    Ok(Json(product))
}
