// Vendor cloud HTTP client
//
// Wraps `reqwest::Client` with user-scoped URL construction and the
// cache/coalescing policy around the robot list. Fetch and command
// failures are absorbed here (logged, degraded results) so the poll
// loop upstairs survives any single bad network interaction; only
// authentication failures propagate.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::CacheStore;
use crate::error::Error;
use crate::models::{Command, Robot, UserProfile, UsersResponse};
use crate::singleflight::{Flight, SingleFlightGate};
use crate::token::TokenManager;
use crate::transport::TransportConfig;

/// Cache key for the robot list.
const DEVICE_LIST_KEY: &str = "device-list";

/// Gate key coalescing concurrent robot-list fetches.
const DEVICE_LIST_FLIGHT_KEY: &str = "device-list-fetch";

/// Everything needed to construct a [`RobotClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://v2.api.whisker.iothings.site`.
    pub endpoint: Url,
    /// SSO token endpoint.
    pub token_endpoint: Url,
    pub email: String,
    pub password: SecretString,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Directory backing the durable cache.
    pub cache_dir: PathBuf,
    /// Freshness window for the cached robot list.
    pub cache_ttl: Duration,
    pub transport: TransportConfig,
}

/// Client for the vendor's robot endpoints.
///
/// Owns the token lifecycle, the durable cache, and the single-flight
/// gate; one instance serves the whole bridge.
pub struct RobotClient {
    http: reqwest::Client,
    endpoint: Url,
    tokens: TokenManager,
    cache: Arc<CacheStore>,
    gate: Arc<SingleFlightGate>,
    cache_ttl: Duration,
    user: Mutex<Option<UserProfile>>,
}

impl RobotClient {
    /// Construct a client from config. Opens (and creates if needed)
    /// the cache directory; no network traffic happens until the first
    /// call.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        let cache = Arc::new(CacheStore::open(&config.cache_dir)?);
        let gate = Arc::new(SingleFlightGate::new());
        let tokens = TokenManager::new(
            http.clone(),
            config.token_endpoint,
            config.client_id,
            config.client_secret,
            config.email,
            config.password,
            Arc::clone(&cache),
            Arc::clone(&gate),
        );

        Ok(Self {
            http,
            endpoint: config.endpoint,
            tokens,
            cache,
            gate,
            cache_ttl: config.cache_ttl,
            user: Mutex::new(None),
        })
    }

    /// The token manager (exposed for session inspection).
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Url {
        let full = format!("{}/{path}", self.endpoint.as_str().trim_end_matches('/'));
        Url::parse(&full).expect("invalid API URL")
    }

    fn user_url(&self, user_id: &str, path: &str) -> Url {
        self.api_url(&format!("users/{user_id}/{path}"))
    }

    // ── Robot list ───────────────────────────────────────────────────

    /// List the account's robots.
    ///
    /// With `use_cache` a fresh-enough cached list is returned with
    /// zero network and zero auth work. Otherwise the fetch runs under
    /// the single-flight gate: concurrent callers coalesce onto one
    /// upstream GET, followers re-read the entry the leader cached.
    /// Fetch failures degrade to an empty list; only authentication
    /// failures surface as errors.
    pub async fn list_robots(&self, use_cache: bool) -> Result<Vec<Robot>, Error> {
        if use_cache {
            if let Some(robots) = self.cache.get::<Vec<Robot>>(DEVICE_LIST_KEY).await {
                debug!(count = robots.len(), "serving robot list from cache");
                return Ok(robots);
            }
        }

        let bearer = match self.tokens.get_valid_token().await {
            Ok(bearer) => bearer,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                warn!(error = %e, "token acquisition failed; returning empty list");
                return Ok(Vec::new());
            }
        };

        match self
            .gate
            .run_exclusive(DEVICE_LIST_FLIGHT_KEY, || self.fetch_robots(&bearer))
            .await
        {
            Flight::Led(robots) => Ok(robots),
            Flight::Followed => {
                // The other caller's fetch is authoritative. An absent
                // entry here means that fetch failed; degrade to empty
                // rather than fetching again.
                Ok(self
                    .cache
                    .get::<Vec<Robot>>(DEVICE_LIST_KEY)
                    .await
                    .unwrap_or_default())
            }
        }
    }

    /// Leader half of the gated fetch. Absorbs every failure into an
    /// empty list; writes the cache only on success.
    async fn fetch_robots(&self, bearer: &str) -> Vec<Robot> {
        let user_id = match self.user_id(bearer).await {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!(error = %e, "failed to resolve account profile");
                return Vec::new();
            }
        };

        let url = self.user_url(&user_id, "robots");
        debug!("GET {}", url);

        let resp = match self
            .http
            .get(url)
            .header(AUTHORIZATION, bearer)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "robot list request failed");
                return Vec::new();
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, %body, "robot list fetch rejected");
            return Vec::new();
        }

        let robots = match resp.json::<Vec<Robot>>().await {
            Ok(robots) => robots,
            Err(e) => {
                warn!(error = %e, "malformed robot list response");
                return Vec::new();
            }
        };

        if let Err(e) = self
            .cache
            .set(DEVICE_LIST_KEY, &robots, self.cache_ttl)
            .await
        {
            warn!(error = %e, "failed to cache robot list");
        }

        debug!(count = robots.len(), "robot list refreshed");
        robots
    }

    /// Resolve and memoize the account profile; the robot and command
    /// endpoints are scoped by user id.
    async fn user_id(&self, bearer: &str) -> Result<String, Error> {
        if let Some(user) = self.user.lock().expect("user cell poisoned").clone() {
            return Ok(user.user_id);
        }

        let url = self.api_url("users");
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let users: UsersResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        let user_id = users.user.user_id.clone();
        debug!(%user_id, "resolved account profile");
        *self.user.lock().expect("user cell poisoned") = Some(users.user);
        Ok(user_id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Dispatch a command to a robot.
    ///
    /// Fire-and-forget: a rejected dispatch is logged and the raw
    /// response body returned as-is. Callers confirm effect by
    /// re-reading state on the next poll. Only authentication failures
    /// surface as errors.
    pub async fn send_command(&self, robot_id: &str, command: Command) -> Result<Value, Error> {
        let bearer = match self.tokens.get_valid_token().await {
            Ok(bearer) => bearer,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                error!(robot_id, error = %e, "token acquisition failed; command not sent");
                return Ok(Value::Null);
            }
        };

        let user_id = match self.user_id(&bearer).await {
            Ok(user_id) => user_id,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                error!(robot_id, error = %e, "profile lookup failed; command not sent");
                return Ok(Value::Null);
            }
        };

        let url = self.user_url(&user_id, &format!("robots/{robot_id}/dispatch-commands"));
        debug!(robot_id, command = command.code(), "POST {}", url);

        let body = json!({
            "command": command.code(),
            "litterRobotId": robot_id,
        });

        let resp = match self
            .http
            .post(url)
            .header(AUTHORIZATION, bearer)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(robot_id, error = %e, "command dispatch failed");
                return Ok(Value::Null);
            }
        };

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !(status == StatusCode::OK || status == StatusCode::CREATED) || raw.is_empty() {
            error!(robot_id, %status, body = %raw, "command dispatch rejected");
        }

        Ok(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
    }

    /// Power the unit on or off (`<P1` / `<P0`).
    pub async fn set_power(&self, robot_id: &str, on: bool) -> Result<Value, Error> {
        let command = if on { Command::PowerOn } else { Command::PowerOff };
        info!(robot_id, on, "setting power");
        self.send_command(robot_id, command).await
    }

    /// Switch the night light (`<N1` / `<N0`).
    pub async fn set_night_light(&self, robot_id: &str, on: bool) -> Result<Value, Error> {
        let command = if on {
            Command::NightLightOn
        } else {
            Command::NightLightOff
        };
        info!(robot_id, on, "setting night light");
        self.send_command(robot_id, command).await
    }

    /// Trigger a clean cycle (`<C`).
    pub async fn start_cleaning(&self, robot_id: &str) -> Result<Value, Error> {
        info!(robot_id, "starting clean cycle");
        self.send_command(robot_id, Command::StartCleaning).await
    }
}
