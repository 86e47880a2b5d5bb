// Shared transport configuration for building reqwest::Client instances.
//
// Every call to the vendor cloud carries the same `User-Agent` and
// `x-api-key` headers, so they are baked into the client as defaults
// instead of repeated at each call site.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Error;

/// Connection parameters captured from the official mobile app's API
/// client. Overridable through [`TransportConfig`] and the endpoint
/// fields in `whisker-core`'s config, but the shipped values are what
/// the vendor cloud actually accepts.
pub mod vendor {
    pub const ENDPOINT: &str = "https://v2.api.whisker.iothings.site";
    pub const TOKEN_ENDPOINT: &str = "https://autopets.sso.iothings.site/oauth/token";
    pub const CLIENT_ID: &str = "IYXzWN908psOm7sNpe4G.ios.whisker.robots";
    pub const CLIENT_SECRET: &str = "C63CLXOmwNaqLTB2xXo6QIWGwwBamcPuaul";
    pub const X_API_KEY: &str = "p7ndMoj61npRZP5CVz9v4Uj0bG769xy6758QRBPb";
    pub const USER_AGENT: &str =
        "Litter-Robot/1.3.4 (com.autopets.whisker.ios; build:59; iOS 14.5.0) Alamofire/4.9.0";
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub api_key: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: vendor::USER_AGENT.to_owned(),
            api_key: vendor::X_API_KEY.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The `x-api-key` header rides along on every request, including
    /// unauthenticated ones -- the vendor gateway rejects calls
    /// without it regardless of bearer state.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| Error::ClientBuild(format!("invalid x-api-key value: {e}")))?;
        headers.insert("x-api-key", api_key);

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ClientBuild(format!("failed to build HTTP client: {e}")))
    }
}
