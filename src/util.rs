use actix_web::HttpResponse;
use http::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Settings;
use crate::handler::RoutingHandler;
use crate::provider_client::{HttpProviderClient, ProviderClient};

/// Load the environment file and install the tracing subscriber.
///
/// Environment file lookup, first hit wins:
/// - explicit path in ENV_FILE, ENVFILE or DOTENV_PATH
/// - `.envfile`, then `.env` in the working directory
/// - `.env` in the executable's directory or any of its parents
///
/// Variables already present in the process environment are never overwritten.
pub fn init_tracing() {
    let env_source = load_env_file().unwrap_or_else(|| "none".to_string());

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

fn load_env_file() -> Option<String> {
    for key in ["ENV_FILE", "ENVFILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty() && Path::new(p).is_file() && dotenvy::from_filename(p).is_ok() {
                return Some(format!("{p} ({key})"));
            }
        }
    }

    if Path::new(".envfile").is_file() && dotenvy::from_filename(".envfile").is_ok() {
        return Some(".envfile".into());
    }
    if dotenvy::dotenv().is_ok() {
        return Some(".env".into());
    }

    let exe = std::env::current_exe().ok()?;
    let mut dir_opt = exe.parent();
    while let Some(dir) = dir_opt {
        let candidate = dir.join(".env");
        if candidate.is_file() && dotenvy::from_filename(&candidate).is_ok() {
            return Some(candidate.display().to_string());
        }
        dir_opt = dir.parent();
    }
    None
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .map(|v| v == "1" || v == "true" || v == "yes" || v == "on")
        .unwrap_or(false)
}

/// Comma-separated environment list; `None` when unset or `*`.
fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = std::env::var(key).ok()?;
    let raw = raw.trim();
    if raw == "*" {
        return None;
    }
    Some(
        raw.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
    )
}

/// Trimmed, non-empty value of `key` (or its lowercase spelling).
fn env_value(key: &str, lower: Option<&str>) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| lower.and_then(|k| std::env::var(k).ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn add_proxy(
    builder: reqwest::ClientBuilder,
    key: &str,
    proxy: reqwest::Result<reqwest::Proxy>,
) -> reqwest::ClientBuilder {
    match proxy {
        Ok(p) => builder.proxy(p),
        Err(e) => {
            tracing::warn!("Ignoring invalid proxy in {}: {}", key, e);
            builder
        }
    }
}

/// Build the outbound HTTP client honoring proxy environment variables.
///
/// Environment:
/// - ROUTEGATE_NO_PROXY = 1|true|yes|on  -> disable all proxies
/// - ROUTEGATE_PROXY_URL = <url>         -> proxy for all schemes
/// - HTTP_PROXY / http_proxy             -> HTTP proxy
/// - HTTPS_PROXY / https_proxy           -> HTTPS proxy
///
/// The provider timeout is applied per request by the provider client.
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if env_flag("ROUTEGATE_NO_PROXY") {
        builder = builder.no_proxy();
    } else {
        if let Some(url) = env_value("ROUTEGATE_PROXY_URL", None) {
            builder = add_proxy(builder, "ROUTEGATE_PROXY_URL", reqwest::Proxy::all(url));
        }
        if let Some(url) = env_value("HTTP_PROXY", Some("http_proxy")) {
            builder = add_proxy(builder, "HTTP_PROXY", reqwest::Proxy::http(url));
        }
        if let Some(url) = env_value("HTTPS_PROXY", Some("https_proxy")) {
            builder = add_proxy(builder, "HTTPS_PROXY", reqwest::Proxy::https(url));
        }
    }

    builder = builder.user_agent(format!("routegate/{}", env!("CARGO_PKG_VERSION")));

    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

/// Shared application state used by the HTTP server and handlers.
pub struct AppState {
    /// Route orchestration over the configured provider client
    pub handler: Arc<RoutingHandler>,
}

impl AppState {
    /// Create AppState from process settings, talking to the real provider.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = HttpProviderClient::new(
            settings.provider_config(Some(build_http_client_from_env())),
        )?;
        Ok(Self::with_provider(
            Arc::new(client),
            settings.payload_options(),
        ))
    }

    /// Create AppState around any provider client
    pub fn with_provider(
        provider: Arc<dyn ProviderClient>,
        options: crate::conversion::PayloadOptions,
    ) -> Self {
        Self {
            handler: Arc::new(RoutingHandler::new(provider, options)),
        }
    }
}

/// Build a JSON error response `{"detail": msg}` with the given HTTP status.
pub fn error_response(status: StatusCode, msg: &str) -> HttpResponse {
    let body = serde_json::json!({ "detail": msg });
    let status = actix_web::http::StatusCode::from_u16(status.as_u16())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(body)
}

/// Build CORS configuration from environment variables.
///
/// Environment:
/// - CORS_ALLOWED_ORIGINS: comma-separated origins or "*"
/// - CORS_ALLOWED_METHODS: comma-separated methods or "*"
/// - CORS_ALLOWED_HEADERS: comma-separated headers or "*"
/// - CORS_ALLOW_CREDENTIALS: 1|true|yes|on
/// - CORS_MAX_AGE: seconds
///
/// Anything unset is permissive.
pub fn cors_config_from_env() -> actix_cors::Cors {
    let mut cors = actix_cors::Cors::default();

    cors = match env_list("CORS_ALLOWED_ORIGINS") {
        Some(origins) if !origins.is_empty() => {
            origins.iter().fold(cors, |c, o| c.allowed_origin(o))
        }
        _ => cors.allow_any_origin(),
    };

    cors = match env_list("CORS_ALLOWED_METHODS") {
        Some(methods) if !methods.is_empty() => {
            cors.allowed_methods(methods.iter().map(|m| m.as_str()))
        }
        _ => cors.allow_any_method(),
    };

    cors = match env_list("CORS_ALLOWED_HEADERS") {
        Some(headers) if !headers.is_empty() => {
            headers.iter().fold(cors, |c, h| c.allowed_header(h.as_str()))
        }
        _ => cors.allow_any_header(),
    };

    if env_flag("CORS_ALLOW_CREDENTIALS") {
        cors = cors.supports_credentials();
    }

    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<usize>() {
            cors = cors.max_age(n);
        }
    }

    cors
}
