use actix_web::{error::InternalError, web, HttpRequest, HttpResponse, Responder};
use http::StatusCode;
use tracing::Instrument;
use uuid::Uuid;

use crate::handler::ServiceError;
use crate::models::RouteRequest;
use crate::util::{error_response, AppState};

const ROUTES: [&str; 2] = ["/status", "/route"];

/// Configure Actix-web routes with AppState.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .app_data(json_config())
            .route("/status", web::get().to(status))
            .route("/route", web::post().to(create_route)),
    );
}

/// Rejected JSON bodies use the same `{"detail"}` envelope as every other error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        let msg = format!("Invalid request body: {}", err);
        tracing::warn!("{}", msg);
        InternalError::from_response(err, error_response(StatusCode::BAD_REQUEST, &msg)).into()
    })
}

/// Service status endpoint exposing the provider setup (never the credential).
async fn status(state: web::Data<AppState>) -> impl Responder {
    let provider = state.handler.provider();
    web::Json(serde_json::json!({
        "name": "routegate",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": ROUTES,
        "provider": {
            "endpoint": provider.endpoint(),
            "timeout_seconds": provider.timeout().map(|t| t.as_secs_f64()),
        },
        "avoid_zones": {
            "ring_closure": state.handler.options().ring_closure.as_str(),
        }
    }))
}

/// Calculate a route between the given coordinates, optionally avoiding polygonal zones.
async fn create_route(state: web::Data<AppState>, body: web::Json<RouteRequest>) -> HttpResponse {
    let request = body.into_inner();
    let span = tracing::info_span!("route", request_id = %Uuid::new_v4());

    async move {
        tracing::info!(
            "Route requested: {} coordinates, {} avoid zones",
            request.coordinates.len(),
            request.avoid_zones.len()
        );
        match state.handler.handle(&request).await {
            Ok(route) => HttpResponse::Ok().json(route),
            Err(e) => service_error_response(&e),
        }
    }
    .instrument(span)
    .await
}

fn service_error_response(err: &ServiceError) -> HttpResponse {
    match err {
        ServiceError::InvalidRequest(e) => tracing::warn!("Rejected route request: {}", e),
        ServiceError::Provider(e) => tracing::warn!("Routing service failure: {}", e),
        ServiceError::Internal(e) => {
            tracing::error!("Unexpected error while processing route: {:?}", e)
        }
    }
    error_response(err.status_code(), &err.public_message())
}
