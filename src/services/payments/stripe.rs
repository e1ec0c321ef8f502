use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::{
    Account, AccountLink, AccountLinkRequest, CheckoutSession, CheckoutSessionRequest,
    GatewayError, List, PaymentGateway, Price, Product,
};

pub struct StripeGateway {
    secret_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: String) -> Self {
        Self {
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Builds an API URL from path segments. Each segment is percent-encoded,
    /// so ids taken from client input stay inside their own segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| GatewayError::network(format!("invalid Stripe API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::network("Stripe API base cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        connected_account: Option<&str>,
    ) -> Result<RequestBuilder, GatewayError> {
        let req = self
            .client
            .request(method, self.endpoint(segments)?)
            .basic_auth(&self.secret_key, Option::<&str>::None);

        Ok(match connected_account {
            Some(account) => req.header("Stripe-Account", account),
            None => req,
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("failed to call Stripe API: {e}")))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::network(format!("failed to read Stripe response: {e}")))?;

        if !status.is_success() {
            // Proxies in front of the API can answer with non-JSON bodies.
            let message = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|data| data["error"]["message"].as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| format!("Stripe API error ({status})"));
            return Err(GatewayError::api(status.as_u16(), message));
        }

        serde_json::from_slice(&body)
            .map_err(|e| GatewayError::invalid_response(format!("unexpected Stripe response: {e}")))
    }
}

/// Stripe takes nested parameters as bracketed form keys.
fn checkout_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), request.mode.as_str().to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        form.push((format!("line_items[{i}][price]"), item.price.clone()));
        form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
    }

    form.push(("success_url".to_string(), request.success_url.clone()));
    form.push(("cancel_url".to_string(), request.cancel_url.clone()));
    form
}

fn account_link_form(request: &AccountLinkRequest) -> Vec<(&'static str, &str)> {
    vec![
        ("account", request.account.as_str()),
        ("return_url", request.return_url.as_str()),
        ("refresh_url", request.refresh_url.as_str()),
        ("type", "account_onboarding"),
    ]
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
        connected_account: Option<&str>,
    ) -> Result<CheckoutSession, GatewayError> {
        let req = self
            .request(Method::POST, &["v1", "checkout", "sessions"], connected_account)?
            .form(&checkout_session_form(request));
        self.send(req).await
    }

    async fn create_account(&self, idempotency_key: Option<&str>) -> Result<Account, GatewayError> {
        let mut req = self
            .request(Method::POST, &["v1", "accounts"], None)?
            .form(&Vec::<(String, String)>::new());
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        self.send(req).await
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, GatewayError> {
        let req = self.request(Method::GET, &["v1", "accounts", account_id], None)?;
        self.send(req).await
    }

    async fn create_account_link(
        &self,
        request: &AccountLinkRequest,
    ) -> Result<AccountLink, GatewayError> {
        let req = self
            .request(Method::POST, &["v1", "account_links"], None)?
            .form(&account_link_form(request));
        self.send(req).await
    }

    async fn list_products(&self, connected_account: &str) -> Result<List<Product>, GatewayError> {
        let req = self.request(Method::GET, &["v1", "products"], Some(connected_account))?;
        self.send(req).await
    }

    async fn retrieve_product(
        &self,
        product_id: &str,
        connected_account: &str,
    ) -> Result<Product, GatewayError> {
        let req = self.request(
            Method::GET,
            &["v1", "products", product_id],
            Some(connected_account),
        )?;
        self.send(req).await
    }

    async fn list_prices(
        &self,
        product_id: &str,
        connected_account: &str,
    ) -> Result<List<Price>, GatewayError> {
        let req = self
            .request(Method::GET, &["v1", "prices"], Some(connected_account))?
            .query(&[("product", product_id), ("limit", "1")]);
        self.send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payments::{CheckoutMode, GatewayErrorKind, LineItem};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves a single canned response and hands back the raw request it got.
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let content_length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_line(raw: &str) -> &str {
        raw.lines().next().unwrap_or("")
    }

    const EMPTY_LIST: &str = r#"{"object":"list","data":[],"has_more":false}"#;

    #[tokio::test]
    async fn test_product_id_stays_in_one_path_segment() {
        let (base, server) = serve_once("200 OK", "application/json", r#"{"id":"prod_1"}"#).await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let _ = gateway.retrieve_product("../customers", "acct_seller").await;
        let raw = server.await.unwrap();
        assert!(request_line(&raw).starts_with("GET /v1/products/..%2Fcustomers "));
    }

    #[tokio::test]
    async fn test_product_id_cannot_add_query() {
        let (base, server) = serve_once("200 OK", "application/json", r#"{"id":"prod_1"}"#).await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let _ = gateway
            .retrieve_product("x?limit=100&expand[]=data.sources", "acct_seller")
            .await;
        let raw = server.await.unwrap();
        let line = request_line(&raw);
        assert!(line.starts_with("GET /v1/products/x%3F"));
        assert!(!line.contains('?'));
    }

    #[tokio::test]
    async fn test_error_envelope_message_is_kept() {
        let (base, server) = serve_once(
            "402 Payment Required",
            "application/json",
            r#"{"error":{"message":"Your card was declined.","type":"card_error"}}"#,
        )
        .await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let err = gateway.retrieve_account("acct_1").await.unwrap_err();
        server.await.unwrap();
        assert_eq!(err.kind, GatewayErrorKind::Api);
        assert_eq!(err.status, Some(402));
        assert_eq!(err.message, "Your card was declined.");
    }

    #[tokio::test]
    async fn test_non_json_error_keeps_status() {
        let (base, server) =
            serve_once("502 Bad Gateway", "text/html", "<html>bad gateway</html>").await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let err = gateway.list_products("acct_seller").await.unwrap_err();
        server.await.unwrap();
        assert_eq!(err.kind, GatewayErrorKind::Api);
        assert_eq!(err.status, Some(502));
        assert_eq!(err.message, "Stripe API error (502 Bad Gateway)");
    }

    #[tokio::test]
    async fn test_list_products_scoped_to_connected_account() {
        let (base, server) = serve_once("200 OK", "application/json", EMPTY_LIST).await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let products = gateway.list_products("acct_seller").await.unwrap();
        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(products.data.is_empty());
        assert!(request_line(&raw).starts_with("get /v1/products "));
        assert!(raw.contains("stripe-account: acct_seller"));
        assert!(raw.contains("authorization: basic "));
    }

    #[tokio::test]
    async fn test_list_prices_filters_by_product() {
        let (base, server) = serve_once("200 OK", "application/json", EMPTY_LIST).await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        gateway.list_prices("prod_cut", "acct_seller").await.unwrap();
        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(request_line(&raw).starts_with("get /v1/prices?product=prod_cut&limit=1 "));
        assert!(raw.contains("stripe-account: acct_seller"));
    }

    #[tokio::test]
    async fn test_create_account_sends_idempotency_key() {
        let (base, server) = serve_once("200 OK", "application/json", r#"{"id":"acct_9"}"#).await;
        let gateway = StripeGateway::new("sk_test_1".to_string(), base);

        let account = gateway
            .create_account(Some("connected-account-user-1"))
            .await
            .unwrap();
        let raw = server.await.unwrap().to_ascii_lowercase();
        assert_eq!(account.id, "acct_9");
        assert!(request_line(&raw).starts_with("post /v1/accounts "));
        assert!(raw.contains("idempotency-key: connected-account-user-1"));
        assert!(!raw.contains("stripe-account:"));
    }

    #[test]
    fn test_checkout_session_form_encoding() {
        let request = CheckoutSessionRequest {
            mode: CheckoutMode::Subscription,
            line_items: vec![LineItem {
                price: "price_123".to_string(),
                quantity: 2,
            }],
            success_url: "https://app.example.com/mas/success".to_string(),
            cancel_url: "https://app.example.com/mas/cancel".to_string(),
        };

        let form = checkout_session_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(get("line_items[0][price]"), Some("price_123"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("success_url"), Some("https://app.example.com/mas/success"));
        assert_eq!(get("cancel_url"), Some("https://app.example.com/mas/cancel"));
    }

    #[test]
    fn test_account_link_form_is_onboarding() {
        let request = AccountLinkRequest {
            account: "acct_1".to_string(),
            return_url: "https://shop.example.com/return/acct_1".to_string(),
            refresh_url: "https://shop.example.com/refresh/acct_1".to_string(),
        };
        let form = account_link_form(&request);
        assert!(form.contains(&("type", "account_onboarding")));
        assert!(form.contains(&("account", "acct_1")));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let gateway = StripeGateway::new("sk_test_1".to_string(), "http://localhost:12111/".to_string());
        assert_eq!(gateway.api_base, "http://localhost:12111");
    }

    #[test]
    fn test_product_passes_through_unknown_fields() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "prod_1",
            "object": "product",
            "name": "Haircut",
            "default_price": "price_1",
            "active": true
        }))
        .unwrap();

        assert_eq!(product.default_price.as_deref(), Some("price_1"));
        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out["active"], true);
        assert_eq!(out["object"], "product");
        assert!(out.get("prices").is_none());
    }
}
