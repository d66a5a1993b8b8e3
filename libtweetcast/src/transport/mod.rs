//! Signed HTTP transport
//!
//! The upload state machine and the publisher never talk to `reqwest`
//! directly; they hand an [`ApiRequest`] to a [`Transport`] and get back the
//! decoded JSON body or a classified [`PlatformError`].
//!
//! Rate-limit responses are surfaced as [`PlatformError::RateLimit`] carrying
//! the server's wait hint. Retrying them is the job of the orchestrator's
//! retry policy (see [`crate::retry`]); the transport itself never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde_json::Value;

use crate::error::{PlatformError, Result};
use crate::oauth::Signer;

// Scripted transport is available for all builds to support integration tests
pub mod mock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// One outbound API call
///
/// `params` are sent as the query string for GET and as a urlencoded form
/// for POST, and are covered by the OAuth signature. When `json` is set the
/// body is sent as JSON instead and `params` should be empty.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            params,
            json: None,
        }
    }

    pub fn post_form(url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            params,
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            params: Vec::new(),
            json: Some(body),
        }
    }

    /// Look up a form/query parameter by name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one signed call and return the decoded JSON body
    ///
    /// An empty success body decodes to `Value::Null`.
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}

/// `reqwest`-backed transport that signs every request
pub struct HttpTransport {
    client: reqwest::Client,
    signer: Signer,
}

impl HttpTransport {
    pub fn new(signer: Signer, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tweetcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, signer })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let authorization =
            self.signer
                .authorization(request.method.as_str(), &request.url, &request.params);

        let builder = match (request.method, &request.json) {
            (HttpMethod::Get, _) => self.client.get(&request.url).query(&request.params),
            (HttpMethod::Post, Some(body)) => self.client.post(&request.url).json(body),
            (HttpMethod::Post, None) => self.client.post(&request.url).form(&request.params),
        };

        let response = builder
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers(), chrono::Utc::now().timestamp());
        let body = response.text().await.map_err(map_reqwest_error)?;

        if (200..300).contains(&status) {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body).map_err(|e| {
                PlatformError::InvalidResponse(format!("Response is not valid JSON: {}", e)).into()
            });
        }

        tracing::debug!(status, url = %request.url, "API call failed");
        Err(classify_status(status, &body, retry_after).into())
    }
}

fn map_reqwest_error(error: reqwest::Error) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Network(format!("Request timed out: {}", error))
    } else if error.is_connect() {
        PlatformError::Network(format!("Connection failed: {}", error))
    } else {
        PlatformError::Network(error.to_string())
    }
}

/// Map a non-2xx response onto the error taxonomy
pub fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> PlatformError {
    let message = extract_error_message(body);
    match status {
        401 | 403 => PlatformError::Authentication(format!(
            "{} (HTTP {}). Check the TWITTER_* credentials and app permissions.",
            message, status
        )),
        429 => PlatformError::RateLimit {
            message,
            retry_after,
        },
        _ => PlatformError::Http { status, message },
    }
}

/// Pull a human-readable message out of an API error body
///
/// Understands the v1.1 `errors[].message` shape, the v2 `detail`/`title`
/// shape and a bare `error` string; falls back to the raw body.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/errors/0/message"),
            value.pointer("/detail"),
            value.pointer("/title"),
            value.pointer("/error"),
        ];
        if let Some(message) = candidates.into_iter().flatten().find_map(|v| v.as_str()) {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(200).collect()
}

/// Server wait hint: `retry-after` (seconds) or `x-rate-limit-reset` (epoch)
pub fn parse_retry_after(headers: &HeaderMap, now: i64) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }

    header("x-rate-limit-reset").map(|reset| Duration::from_secs((reset - now).max(0) as u64))
}
