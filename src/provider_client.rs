//! Provider Client Module
//!
//! Sends translated directions requests to the routing provider and classifies every way
//! the call can fail.
//!
//! ## Architecture
//!
//! - `ProviderClient` trait: the seam the request handler talks to
//! - `HttpProviderClient`: OpenRouteService-style client over `reqwest`
//! - `ProviderError`: timeout, transport, upstream HTTP and malformed-body failures
//!
//! One attempt per request. The timeout covers connect, send and reading the body.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::models::UpstreamPayload;

/// Default public directions endpoint (driving profile, GeoJSON response).
pub const DEFAULT_PROVIDER_URL: &str =
    "https://api.openrouteservice.org/v2/directions/driving-car/geojson";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const ACCEPT_GEOJSON: &str = "application/json, application/geo+json";

/// Raw bodies kept for diagnostics are cut to this many characters.
const RAW_BODY_LOG_LIMIT: usize = 500;

/// Provider failure classes
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Routing service timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Routing service connection failed: {0}")]
    Transport(String),

    #[error("Routing service returned {status}: {message}")]
    UpstreamHttp { status: u16, message: String },

    /// `raw` is kept for logs only and never shown to callers.
    #[error("Malformed routing service response: {reason}")]
    MalformedResponse { reason: String, raw: Option<Value> },
}

impl ProviderError {
    pub fn malformed(reason: impl Into<String>, raw: &Value) -> Self {
        ProviderError::MalformedResponse {
            reason: reason.into(),
            raw: Some(raw.clone()),
        }
    }
}

/// Successful provider reply, already decoded as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProviderResponse {
    pub status: u16,
    pub body: Value,
}

/// Directions call used by the request handler
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send one directions request.
    async fn call(&self, payload: &UpstreamPayload) -> Result<RawProviderResponse, ProviderError>;

    /// Endpoint the client talks to, for status reporting.
    fn endpoint(&self) -> Option<String> {
        None
    }

    /// Configured timeout, for status reporting.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// How the credential is placed in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AuthScheme {
    /// `Authorization: <key>` (OpenRouteService API keys)
    #[default]
    Raw,
    /// `Authorization: Bearer <key>`
    Bearer,
}

/// HTTP provider client configuration
#[derive(Clone)]
pub struct HttpProviderConfig {
    /// Full directions URL
    pub url: String,

    /// Credential forwarded on every call
    pub api_key: String,

    pub auth_scheme: AuthScheme,

    /// Overall request timeout
    pub timeout: Duration,

    /// HTTP client (shared)
    pub client: Option<reqwest::Client>,
}

impl std::fmt::Debug for HttpProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("auth_scheme", &self.auth_scheme)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: String::new(),
            auth_scheme: AuthScheme::Raw,
            timeout: DEFAULT_TIMEOUT,
            client: None,
        }
    }
}

/// HTTP-based provider client
pub struct HttpProviderClient {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

impl HttpProviderClient {
    /// Create new HTTP provider client
    pub fn new(mut config: HttpProviderConfig) -> Result<Self> {
        let client = if let Some(c) = config.client.take() {
            c
        } else {
            reqwest::Client::builder()
                .pool_idle_timeout(Duration::from_secs(60))
                .pool_max_idle_per_host(10)
                .build()?
        };

        Ok(Self { config, client })
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            tracing::error!(
                "Routing service request timed out after {:?} ({})",
                self.config.timeout,
                self.config.url
            );
            ProviderError::Timeout {
                after: self.config.timeout,
            }
        } else {
            tracing::error!("Routing service request failed: {}", err);
            ProviderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn call(&self, payload: &UpstreamPayload) -> Result<RawProviderResponse, ProviderError> {
        let mut rb = self
            .client
            .post(&self.config.url)
            .timeout(self.config.timeout)
            .header(header::ACCEPT, ACCEPT_GEOJSON)
            .json(payload);
        rb = match self.config.auth_scheme {
            AuthScheme::Raw => rb.header(header::AUTHORIZATION, &self.config.api_key),
            AuthScheme::Bearer => rb.bearer_auth(&self.config.api_key),
        };

        let response = rb.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let message = upstream_error_message(status, &text);
            tracing::error!("Routing service error {}: {}", status.as_u16(), message);
            return Err(ProviderError::UpstreamHttp {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                "Failed to decode routing service JSON response: {}\nResponse body (first {} chars): {}",
                e,
                RAW_BODY_LOG_LIMIT,
                truncate(&text, RAW_BODY_LOG_LIMIT)
            );
            ProviderError::MalformedResponse {
                reason: "response body is not valid JSON".to_string(),
                raw: Some(Value::String(truncate(&text, RAW_BODY_LOG_LIMIT).to_string())),
            }
        })?;

        Ok(RawProviderResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.config.url.clone())
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.config.timeout)
    }
}

// Provider error envelopes: {"error": {"code": 2004, "message": "..."}} or {"error": "..."}
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

/// Message for a non-success reply: the envelope's message if present, else the raw text.
fn upstream_error_message(status: reqwest::StatusCode, text: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(text) {
        return match envelope.error {
            ErrorBody::Detailed { message } | ErrorBody::Plain(message) => message,
        };
    }
    if text.trim().is_empty() {
        return format!("Routing service returned HTTP {}", status);
    }
    text.to_string()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
