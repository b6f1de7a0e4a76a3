//! Green-API REST client.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::config::GreenApiCredentials;
use crate::domains::tools::HandlerError;

/// Longest error body echoed back to the caller.
const MAX_ERROR_CHARS: usize = 300;

/// Green-API methods used by the adapter. `method` is the Green-API method
/// name (`getStateInstance`, `sendMessage`, ...).
#[async_trait]
pub trait WhatsAppApi: Send + Sync {
    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<Value, HandlerError>;
    async fn post(&self, method: &str, body: &Value) -> Result<Value, HandlerError>;
}

/// One Green-API instance, addressed as
/// `{api_url}/waInstance{id}/{method}/{token}`.
pub struct GreenApi {
    http: reqwest::Client,
    instance_id: Option<String>,
    api_token: Option<String>,
    api_url: String,
}

impl GreenApi {
    pub fn new(http: reqwest::Client, credentials: &GreenApiCredentials) -> Self {
        Self {
            http,
            instance_id: credentials.instance_id.clone(),
            api_token: credentials.api_token.clone(),
            api_url: credentials.api_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, method: &str) -> Result<String, HandlerError> {
        match (&self.instance_id, &self.api_token) {
            (Some(id), Some(token)) => Ok(format!("{}/waInstance{id}/{method}/{token}", self.api_url)),
            _ => Err(HandlerError::not_configured("Green-API")),
        }
    }

    async fn send(&self, method: &str, request: reqwest::RequestBuilder) -> Result<Value, HandlerError> {
        let call = format!("green-api {method}");
        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::external(&call, e.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HandlerError::external(&call, e.without_url()))?;
        if !status.is_success() {
            let body: String = body.chars().take(MAX_ERROR_CHARS).collect();
            return Err(HandlerError::external(call, format!("HTTP {status}: {body}")));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| HandlerError::external(call, format!("invalid JSON response: {e}")))
    }
}

#[async_trait]
impl WhatsAppApi for GreenApi {
    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<Value, HandlerError> {
        debug!("Green-API GET {}", method);
        let request = self.http.get(self.url(method)?).query(query);
        self.send(method, request).await
    }

    async fn post(&self, method: &str, body: &Value) -> Result<Value, HandlerError> {
        debug!("Green-API POST {}", method);
        let request = self.http.post(self.url(method)?).json(body);
        self.send(method, request).await
    }
}
