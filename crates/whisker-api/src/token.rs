// ── OAuth token lifecycle ──
//
// Password-grant exchange against the vendor SSO, proactive refresh
// inside a safety margin, and refresh→password fallback. Refreshes are
// serialized through the shared SingleFlightGate so concurrent callers
// trigger at most one exchange.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::cache::CacheStore;
use crate::error::Error;
use crate::models::TokenResponse;
use crate::singleflight::{Flight, SingleFlightGate};

/// Remaining lifetime below which a token is refreshed before use.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(120);

/// Cache key for the persisted session.
const AUTH_CACHE_KEY: &str = "auth";

/// Gate key serializing refresh exchanges.
const REFRESH_FLIGHT_KEY: &str = "token-refresh";

/// An issued access token with its expiry.
///
/// Never leaves [`TokenManager`] except as the opaque bearer value
/// attached to outgoing requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn from_response(resp: TokenResponse) -> Self {
        let lifetime = i64::try_from(resp.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at: Utc::now()
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the token expires within `margin` of `now`. Remaining
    /// lifetime of exactly `margin` does not count as expiring.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin = i64::try_from(margin.as_secs())
            .map(TimeDelta::seconds)
            .unwrap_or(TimeDelta::MAX);
        self.expires_at - now < margin
    }
}

/// Owns the credential exchange and refresh lifecycle.
///
/// Credentials are fixed for the process lifetime. A token consumed by
/// a request is never expired at the moment of consumption: anything
/// inside the refresh margin is exchanged before being handed out.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    email: String,
    password: SecretString,
    state: Mutex<Option<AccessToken>>,
    cache: Arc<CacheStore>,
    gate: Arc<SingleFlightGate>,
    margin: Duration,
}

impl TokenManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        token_url: Url,
        client_id: String,
        client_secret: SecretString,
        email: String,
        password: SecretString,
        cache: Arc<CacheStore>,
        gate: Arc<SingleFlightGate>,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id,
            client_secret,
            email,
            password,
            state: Mutex::new(None),
            cache,
            gate,
            margin: REFRESH_MARGIN,
        }
    }

    /// Return a bearer value guaranteed to outlive the refresh margin.
    ///
    /// The common path is lock-check-return with no I/O. Otherwise a
    /// single exchange runs under the `"token-refresh"` flight;
    /// followers re-read the state the leader wrote and only lead
    /// their own exchange if that flight failed.
    pub async fn get_valid_token(&self) -> Result<String, Error> {
        loop {
            if let Some(bearer) = self.fresh_bearer() {
                return Ok(bearer);
            }
            match self
                .gate
                .run_exclusive(REFRESH_FLIGHT_KEY, || self.acquire())
                .await
            {
                Flight::Led(result) => return result,
                Flight::Followed => {
                    debug!("another task completed a token exchange; re-checking");
                }
            }
        }
    }

    fn fresh_bearer(&self) -> Option<String> {
        let state = self.state.lock().expect("token state poisoned");
        state
            .as_ref()
            .filter(|t| !t.expires_within(self.margin, Utc::now()))
            .map(|t| t.access_token.clone())
    }

    /// Leader path: adopt a persisted session if one is still usable,
    /// otherwise refresh or re-authenticate.
    async fn acquire(&self) -> Result<String, Error> {
        // A racing flight may have finished between our staleness check
        // and winning the gate.
        if let Some(bearer) = self.fresh_bearer() {
            return Ok(bearer);
        }

        let current = self.state.lock().expect("token state poisoned").clone();

        if current.is_none() {
            if let Some(persisted) = self.cache.get::<AccessToken>(AUTH_CACHE_KEY).await {
                if !persisted.expires_within(self.margin, Utc::now()) {
                    debug!("adopted persisted session from cache");
                    let bearer = persisted.access_token.clone();
                    *self.state.lock().expect("token state poisoned") = Some(persisted);
                    return Ok(bearer);
                }
            }
        }

        let token = match current.and_then(|t| t.refresh_token) {
            Some(refresh_token) => match self.refresh_grant(&refresh_token).await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "token refresh failed; re-authenticating");
                    self.password_grant().await?
                }
            },
            None => self.password_grant().await?,
        };

        let bearer = token.access_token.clone();
        let ttl = (token.expires_at - Utc::now()).to_std().unwrap_or_default();
        if let Err(e) = self.cache.set(AUTH_CACHE_KEY, &token, ttl).await {
            warn!(error = %e, "failed to persist session");
        }
        *self.state.lock().expect("token state poisoned") = Some(token);
        Ok(bearer)
    }

    async fn password_grant(&self) -> Result<AccessToken, Error> {
        debug!("requesting token via password grant");
        self.exchange(&json!({
            "grant_type": "password",
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "username": self.email,
            "password": self.password.expose_secret(),
        }))
        .await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<AccessToken, Error> {
        debug!("refreshing access token");
        self.exchange(&json!({
            "grant_type": "refresh_token",
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "refresh_token": refresh_token,
        }))
        .await
    }

    /// POST a grant body to the token endpoint. Non-2xx and missing
    /// fields both surface as [`Error::Authentication`]; no retry here,
    /// the caller decides.
    async fn exchange(&self, body: &serde_json::Value) -> Result<AccessToken, Error> {
        let resp = self
            .http
            .post(self.token_url.clone())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("token endpoint rejected the exchange (HTTP {status}): {body}"),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Authentication {
                message: format!("malformed token response: {e}"),
            }
        })?;

        debug!(expires_in = parsed.expires_in, "token exchange successful");
        Ok(AccessToken::from_response(parsed))
    }
}
