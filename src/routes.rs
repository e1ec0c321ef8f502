use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::add_user),
        )
        .route("/users/", get(handlers::users::get_user_by_id))
        .route("/users/:id", get(handlers::users::get_user_by_id))
        .route("/users/:id/products", get(handlers::connect::stripe_products))
        .route(
            "/users/:id/products/:product_id",
            get(handlers::connect::stripe_product),
        )
        .route(
            "/user",
            get(handlers::users::get_current_user).put(handlers::users::update_user),
        )
        .route(
            "/user/settings",
            get(handlers::settings::get_settings).put(handlers::settings::update_settings),
        )
        .route("/user/subscribe", post(handlers::billing::subscribe))
        .route("/user/subscribed", get(handlers::billing::subscribed))
        .route("/user/checkout", post(handlers::billing::checkout))
        .route("/user/stripe-account", post(handlers::connect::stripe_account))
        .route(
            "/user/stripe-account-link",
            post(handlers::connect::stripe_account_link),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
