use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use userbase::config::AppConfig;
use userbase::db;
use userbase::routes;
use userbase::services::payments::stripe::StripeGateway;
use userbase::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    anyhow::ensure!(!config.stripe_secret.is_empty(), "STRIPE_SECRET must be set");
    if config.redirect_uri.is_empty() {
        tracing::warn!("REDIRECT_URI is not set, subscription redirects will be relative");
    }

    let conn = db::init_db(&config.database_url)?;

    tracing::info!("using Stripe API at {}", config.stripe_api_base);
    let payments = StripeGateway::new(config.stripe_secret.clone(), config.stripe_api_base.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
