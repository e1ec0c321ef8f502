pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// The request never got a response.
    Network,
    /// The provider answered with an error status.
    Api,
    /// The response body could not be decoded.
    InvalidResponse,
}

/// Failure talking to the payment provider. Displays as the provider's own
/// message so it can be forwarded to the client unchanged.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Network,
            message: message.into(),
            status: None,
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::Api,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: GatewayErrorKind::InvalidResponse,
            message: message.into(),
            status: None,
        }
    }
}

// ── Requests ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Subscription,
    Payment,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Subscription => "subscription",
            CheckoutMode::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub price: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub mode: CheckoutMode,
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Onboarding link for a connected account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountLinkRequest {
    pub account: String,
    pub return_url: String,
    pub refresh_url: String,
}

// ── Provider objects ──
//
// Only the fields this service reads are typed; everything else the provider
// returns is kept in `extra` and passed through to clients.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct List<T> {
    #[serde(default = "list_object")]
    pub object: String,
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn list_object() -> String {
    "list".to_string()
}

impl<T> List<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            object: list_object(),
            data,
            has_more: false,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountLink {
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_price: Option<String>,
    /// First listed price of the product, attached by this service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<Price>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session, on the platform account or, when
    /// `connected_account` is set, on behalf of that account.
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
        connected_account: Option<&str>,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Creates a connected account. Repeating a call with the same
    /// idempotency key returns the account created by the first call.
    async fn create_account(&self, idempotency_key: Option<&str>) -> Result<Account, GatewayError>;

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, GatewayError>;

    async fn create_account_link(
        &self,
        request: &AccountLinkRequest,
    ) -> Result<AccountLink, GatewayError>;

    async fn list_products(&self, connected_account: &str) -> Result<List<Product>, GatewayError>;

    async fn retrieve_product(
        &self,
        product_id: &str,
        connected_account: &str,
    ) -> Result<Product, GatewayError>;

    /// Prices belonging to `product_id`, newest first.
    async fn list_prices(
        &self,
        product_id: &str,
        connected_account: &str,
    ) -> Result<List<Price>, GatewayError>;
}
