use serde_json::Value;
use std::sync::RwLock;

use crate::error::{AtlasError, Result};
use crate::transport::{HttpResponse, HttpTransport};

/// Tries an ordered list of mirrors for the same POST endpoint and
/// front-loads whichever answered last.
///
/// The preference lives on the instance, so independent selectors never
/// share it. It is never persisted.
#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    preferred: RwLock<Option<String>>,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            preferred: RwLock::new(None),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Last endpoint that returned a success status
    pub fn preferred(&self) -> Option<String> {
        self.preferred
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn remember(&self, endpoint: &str) {
        let mut guard = self
            .preferred
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(endpoint.to_string());
    }

    /// `[preferred, ...endpoints minus preferred]`
    pub fn try_order(&self) -> Vec<String> {
        match self.preferred() {
            Some(preferred) => std::iter::once(preferred.clone())
                .chain(self.endpoints.iter().filter(|e| **e != preferred).cloned())
                .collect(),
            None => self.endpoints.clone(),
        }
    }

    /// POST `body` to each endpoint in try-order until one answers 2xx.
    ///
    /// Exhaustion yields `RateLimited` if any endpoint answered 429, so the
    /// caller's rate-limit backoff can see it; otherwise `EndpointExhausted`.
    pub async fn post(&self, transport: &dyn HttpTransport, body: &Value) -> Result<HttpResponse> {
        let order = self.try_order();
        let mut rate_limited = false;

        for endpoint in &order {
            match transport.post_json(endpoint, body, &[]).await {
                Ok(response) if response.is_success() => {
                    self.remember(endpoint);
                    return Ok(response);
                }
                Ok(response) => {
                    tracing::debug!("Endpoint {} answered HTTP {}", endpoint, response.status);
                    rate_limited |= response.is_rate_limited();
                }
                Err(e) => {
                    tracing::debug!("Endpoint {} unreachable: {}", endpoint, e);
                }
            }
        }

        if rate_limited {
            Err(AtlasError::RateLimited)
        } else {
            Err(AtlasError::EndpointExhausted {
                attempted: order.len(),
            })
        }
    }
}
