//! Authenticated JSON client for Google REST APIs.
//!
//! Shared by the Calendar and Gmail adapters.

pub mod auth;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::domains::tools::HandlerError;

pub use auth::GoogleAuth;

pub const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
pub const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1";

/// Longest error body echoed back to the caller.
const MAX_ERROR_CHARS: usize = 300;

/// Pull `error.message` out of a Google error body, or fall back to the
/// (truncated) body itself.
pub(crate) fn api_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.pointer("/error_description"))
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
    });
    match message {
        Some(message) => message.to_string(),
        None => body.chars().take(MAX_ERROR_CHARS).collect(),
    }
}

/// One Google API rooted at `base_url`.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, auth: Arc<GoogleAuth>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            auth,
            base_url: base_url.into(),
        }
    }

    /// Send a request and decode the JSON response. Empty bodies decode
    /// to `Value::Null`.
    pub async fn request(
        &self,
        call: &str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, HandlerError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::external(call, e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND {
                return Err(HandlerError::not_found(format!(
                    "{call}: not found ({})",
                    api_error_message(&body)
                )));
            }
            return Err(HandlerError::external(
                call,
                format!("HTTP {status}: {}", api_error_message(&body)),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HandlerError::external(call, e.without_url()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| HandlerError::external(call, format!("invalid JSON response: {e}")))
    }

    pub async fn get(&self, call: &str, path: &str, query: &[(&str, String)]) -> Result<Value, HandlerError> {
        self.request(call, Method::GET, path, query, None).await
    }

    pub async fn post(&self, call: &str, path: &str, body: &Value) -> Result<Value, HandlerError> {
        self.request(call, Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, call: &str, path: &str, body: &Value) -> Result<Value, HandlerError> {
        self.request(call, Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, call: &str, path: &str) -> Result<(), HandlerError> {
        self.request(call, Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}

/// Percent-encode one URL path segment (calendar IDs contain `#` and `@`).
pub(crate) fn path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
