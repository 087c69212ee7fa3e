//! Route request orchestration.
//!
//! `RoutingHandler::handle` runs the payload conversion, the provider call and the response
//! extraction strictly in sequence. Every failure comes back as a [`ServiceError`]; the
//! HTTP status is chosen from it only at the server boundary.

use anyhow::anyhow;
use futures::FutureExt;
use http::StatusCode;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::conversion::{build_payload, extract_route, PayloadOptions, ValidationError};
use crate::models::{RouteRequest, RouteResponse, UpstreamPayload};
use crate::provider_client::{ProviderClient, ProviderError};

/// Shown to callers in place of any unclassified failure.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal server error occurred while processing the route.";

/// Route request failures
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ServiceError {
    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Provider(ProviderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `detail` field of the error body.
    ///
    /// Upstream HTTP errors pass the provider's message through; transport and internal
    /// failures never expose their underlying error text.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::InvalidRequest(e) => e.to_string(),
            ServiceError::Provider(ProviderError::Timeout { .. }) => {
                "Routing service request timed out.".to_string()
            }
            ServiceError::Provider(ProviderError::Transport(_)) => {
                "Routing service connection failed.".to_string()
            }
            ServiceError::Provider(ProviderError::UpstreamHttp { message, .. }) => message.clone(),
            ServiceError::Provider(ProviderError::MalformedResponse { reason, .. }) => {
                format!("Could not parse route from routing service: {}", reason)
            }
            ServiceError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Stateless route handler shared by all requests.
pub struct RoutingHandler {
    provider: Arc<dyn ProviderClient>,
    options: PayloadOptions,
}

impl RoutingHandler {
    pub fn new(provider: Arc<dyn ProviderClient>, options: PayloadOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider(&self) -> &dyn ProviderClient {
        self.provider.as_ref()
    }

    pub fn options(&self) -> &PayloadOptions {
        &self.options
    }

    /// Compute a route through the provider.
    pub async fn handle(&self, request: &RouteRequest) -> Result<RouteResponse, ServiceError> {
        let payload = build_payload(request, &self.options)?;
        log_payload(&payload);

        // A panicking provider implementation is an internal error, not a crashed worker.
        let raw = AssertUnwindSafe(self.provider.call(&payload))
            .catch_unwind()
            .await
            .map_err(|panic| {
                ServiceError::Internal(anyhow!(
                    "provider call panicked: {}",
                    panic_message(panic.as_ref())
                ))
            })??;

        let route = extract_route(&raw)?;
        tracing::debug!("Route extracted with {} points", route.route.len());
        Ok(route)
    }
}

fn log_payload(payload: &UpstreamPayload) {
    match &payload.options {
        Some(options) => tracing::info!(
            "Sending request to routing service: {} coordinates, avoid_polygons {} ({})",
            payload.coordinates.len(),
            options.avoid_polygons.kind(),
            serde_json::to_string(&options.avoid_polygons).unwrap_or_default()
        ),
        None => tracing::info!(
            "Sending request to routing service: {} coordinates, no options",
            payload.coordinates.len()
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
