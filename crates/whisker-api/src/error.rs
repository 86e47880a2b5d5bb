use thiserror::Error;

/// Top-level error type for the `whisker-api` crate.
///
/// Covers authentication, transport, vendor API, and cache failures.
/// `whisker-core` maps these into consumer-facing diagnostics. Fetch
/// and command failures are mostly absorbed inside [`crate::client`];
/// the variants here are what still crosses the crate boundary.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The identity provider rejected the credentials, or its response
    /// was missing required fields.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The `reqwest::Client` could not be constructed.
    #[error("HTTP client construction failed: {0}")]
    ClientBuild(String),

    // ── Vendor API ──────────────────────────────────────────────────
    /// Unexpected status from the vendor API, with the raw body.
    #[error("Vendor API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Cache ───────────────────────────────────────────────────────
    /// Cache entry could not be encoded or persisted.
    #[error("Cache I/O error: {0}")]
    Cache(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a credential/session failure the
    /// caller should surface rather than absorb.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on a
    /// later poll tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
