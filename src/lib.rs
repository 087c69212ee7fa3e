#![forbid(unsafe_code)]
#![doc = r#"
Routegate

Accept routing requests with optional avoid zones, translate them into OpenRouteService directions payloads and reshape the provider's GeoJSON reply into a flat list of `{lat, lng}` points.

Crate highlights
- Library: pure conversion via `build_payload(&RouteRequest, &PayloadOptions)` and `extract_route(&RawProviderResponse)`.
- Provider seam: `ProviderClient` trait with the `HttpProviderClient` implementation (single attempt, bounded timeout).
- HTTP server (in `server`): `POST /route` and `GET /status`, errors as `{"detail": ...}`.

Modules
- `models`: Inbound/outbound data structures and the provider payload.
- `conversion`: Coordinate reordering, avoid-zone geometry and route extraction.
- `provider_client`: Outbound call and failure classification.
- `handler`: Orchestration and the error taxonomy with its HTTP status mapping.
- `config`: Command line / environment settings.
- `server`: Actix-web routes and handlers.
- `util`: Shared helpers (tracing, env, HTTP client, CORS).

Note: application coordinates are `{lat, lng}`; GeoJSON positions are `[lng, lat]`. The swap happens only in `conversion`.
"#]

pub mod config;
pub mod conversion;
pub mod handler;
pub mod models;
pub mod provider_client;
pub mod server;
pub mod util;

// Re-export the primary conversion functions for ergonomic library use.
pub use crate::config::Settings;
pub use crate::conversion::{
    build_payload, extract_route, PayloadOptions, RingClosure, ValidationError,
};
pub use crate::handler::{RoutingHandler, ServiceError};
pub use crate::models::{
    AvoidPolygons, AvoidZone, Coordinate, RouteRequest, RouteResponse, UpstreamPayload,
};
pub use crate::provider_client::{
    AuthScheme, HttpProviderClient, HttpProviderConfig, ProviderClient, ProviderError,
    RawProviderResponse,
};
