use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{AtlasError, Result};

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Raw HTTP access used by providers, image probes and the notifier.
///
/// Any status code is an `Ok`; `Err` means no response arrived.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value, headers: &[(&str, &str)]) -> Result<HttpResponse>;

    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Status-only request, used to probe image URLs
    async fn head(&self, url: &str) -> Result<u16>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("anime-atlas-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body);

        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }

    async fn head(&self, url: &str) -> Result<u16> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().as_u16())
    }
}

impl From<HttpResponse> for AtlasError {
    fn from(response: HttpResponse) -> Self {
        if response.is_rate_limited() {
            AtlasError::RateLimited
        } else {
            AtlasError::HttpStatus {
                status: response.status,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_classification() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(429, "").is_success());
        assert!(HttpResponse::new(429, "").is_rate_limited());
    }

    #[test]
    fn test_status_into_error() {
        assert!(matches!(AtlasError::from(HttpResponse::new(429, "")), AtlasError::RateLimited));
        assert!(matches!(
            AtlasError::from(HttpResponse::new(503, "")),
            AtlasError::HttpStatus { status: 503 }
        ));
    }

    #[tokio::test]
    async fn test_scripted_routes_replay_then_repeat() {
        use mock::{Reply, ScriptedTransport};

        let transport = ScriptedTransport::new()
            .route("https://a.test/x", vec![Reply::status(503)])
            .route("https://a.test", vec![Reply::status(429), Reply::ok("{}")]);

        assert_eq!(transport.get("https://a.test/x/1").await.unwrap().status, 503);
        assert_eq!(transport.get("https://a.test/y").await.unwrap().status, 429);
        assert_eq!(transport.get("https://a.test/y").await.unwrap().status, 200);
        assert_eq!(transport.get("https://a.test/y").await.unwrap().status, 200);
        assert!(transport.get("https://elsewhere.test").await.is_err());
        assert_eq!(transport.call_count(), 5);
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
