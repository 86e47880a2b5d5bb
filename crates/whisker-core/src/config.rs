// ── Runtime bridge configuration ──
//
// These types describe how to reach the vendor cloud and how the
// bridge behaves. The host adapter constructs a `BridgeConfig` and
// hands it in -- core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use whisker_api::transport::vendor;
use whisker_api::{ClientConfig, TransportConfig};

/// Default freshness window for the cached robot list.
///
/// Characteristic reads arrive in bursts (a client app opening queries
/// several within the same second); a short window folds a burst into
/// one round trip while keeping displayed state close to live.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Default cadence for the background poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Account credentials, fixed for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

/// Vendor service endpoints and API constants.
///
/// The defaults are the shipped vendor values; overriding them is
/// mainly useful for pointing tests at a mock server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VendorEndpoints {
    pub api: Url,
    pub token: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_key: String,
    pub user_agent: String,
}

impl Default for VendorEndpoints {
    fn default() -> Self {
        Self {
            api: vendor::ENDPOINT.parse().expect("vendor endpoint URL"),
            token: vendor::TOKEN_ENDPOINT.parse().expect("vendor token URL"),
            client_id: vendor::CLIENT_ID.to_owned(),
            client_secret: SecretString::from(vendor::CLIENT_SECRET.to_owned()),
            api_key: vendor::X_API_KEY.to_owned(),
            user_agent: vendor::USER_AGENT.to_owned(),
        }
    }
}

/// Configuration for one bridge instance.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub endpoints: VendorEndpoints,
    /// Directory for the durable cache (`"device-list"`, `"auth"`).
    pub cache_dir: PathBuf,
    /// Freshness window for the cached robot list.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,
    /// Cadence for the background poll loop.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Per-request timeout for vendor calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl BridgeConfig {
    /// Minimal config with vendor defaults for everything else.
    pub fn new(email: impl Into<String>, password: SecretString, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials: Credentials {
                email: email.into(),
                password,
            },
            endpoints: VendorEndpoints::default(),
            cache_dir: cache_dir.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Lower this config into the API layer's client config.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoints.api.clone(),
            token_endpoint: self.endpoints.token.clone(),
            email: self.credentials.email.clone(),
            password: self.credentials.password.clone(),
            client_id: self.endpoints.client_id.clone(),
            client_secret: self.endpoints.client_secret.clone(),
            cache_dir: self.cache_dir.clone(),
            cache_ttl: self.cache_ttl,
            transport: TransportConfig {
                timeout: self.request_timeout,
                user_agent: self.endpoints.user_agent.clone(),
                api_key: self.endpoints.api_key.clone(),
            },
        }
    }
}
