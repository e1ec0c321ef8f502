use std::env;

pub const DEFAULT_SUBSCRIPTION_PRICE_ID: &str = "price_1PJmgDCTfeGF4JbWnLe5aEyU";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub stripe_secret: String,
    pub stripe_api_base: String,
    pub subscription_price_id: String,
    pub redirect_uri: String,
    /// Header an upstream auth layer uses to identify the caller.
    pub auth_user_header: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "users.db".to_string()),
            stripe_secret: env::var("STRIPE_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            subscription_price_id: env::var("SUBSCRIPTION_PRICE_ID")
                .unwrap_or_else(|_| DEFAULT_SUBSCRIPTION_PRICE_ID.to_string()),
            redirect_uri: env::var("REDIRECT_URI")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            auth_user_header: env::var("AUTH_USER_HEADER")
                .map(|v| v.to_ascii_lowercase())
                .unwrap_or_else(|_| "x-user-id".to_string()),
        }
    }

    pub fn subscription_success_url(&self) -> String {
        format!("{}/mas/success", self.redirect_uri)
    }

    pub fn subscription_cancel_url(&self) -> String {
        format!("{}/mas/cancel", self.redirect_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(redirect_uri: &str) -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            stripe_secret: "sk_test_123".to_string(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            subscription_price_id: DEFAULT_SUBSCRIPTION_PRICE_ID.to_string(),
            redirect_uri: redirect_uri.to_string(),
            auth_user_header: "x-user-id".to_string(),
        }
    }

    #[test]
    fn test_subscription_redirect_urls() {
        let cfg = config("https://app.example.com");
        assert_eq!(cfg.subscription_success_url(), "https://app.example.com/mas/success");
        assert_eq!(cfg.subscription_cancel_url(), "https://app.example.com/mas/cancel");
    }
}
