//! Process configuration.
//!
//! Every option can be given as a flag or through the environment; `util::init_tracing`
//! loads `.env` files before the settings are parsed.

use clap::Parser;
use std::time::Duration;

use crate::conversion::{PayloadOptions, RingClosure};
use crate::provider_client::{AuthScheme, HttpProviderConfig, DEFAULT_PROVIDER_URL};

#[derive(Clone, Parser)]
#[command(
    name = "routegate",
    version,
    about = "Routing façade for OpenRouteService directions with avoid zones"
)]
pub struct Settings {
    /// Provider directions URL (GeoJSON flavour)
    #[arg(long, env = "ORS_URL", default_value = DEFAULT_PROVIDER_URL)]
    pub provider_url: String,

    /// Provider API key
    #[arg(long, env = "ORS_TOKEN", hide_env_values = true)]
    pub api_key: String,

    /// Provider request timeout in seconds
    #[arg(long, env = "ORS_TIMEOUT", default_value_t = 15)]
    pub timeout_seconds: u64,

    /// How the API key is sent in the Authorization header
    #[arg(long, env = "ORS_AUTH_SCHEME", value_enum, default_value_t = AuthScheme::Raw)]
    pub auth_scheme: AuthScheme,

    /// Append the first point to avoid-zone rings that are not closed
    #[arg(long, env = "ROUTEGATE_CLOSE_RINGS")]
    pub close_rings: bool,

    /// HTTP listen address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider_url", &self.provider_url)
            .field("api_key", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("auth_scheme", &self.auth_scheme)
            .field("close_rings", &self.close_rings)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn payload_options(&self) -> PayloadOptions {
        PayloadOptions {
            ring_closure: if self.close_rings {
                RingClosure::Close
            } else {
                RingClosure::Preserve
            },
        }
    }

    /// Provider client configuration; `client` carries the shared proxy/user-agent setup.
    pub fn provider_config(&self, client: Option<reqwest::Client>) -> HttpProviderConfig {
        HttpProviderConfig {
            url: self.provider_url.clone(),
            api_key: self.api_key.clone(),
            auth_scheme: self.auth_scheme,
            timeout: self.timeout(),
            client,
        }
    }
}
