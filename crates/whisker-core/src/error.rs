// ── Core error types ──
//
// Consumer-facing errors from whisker-core. These are NOT
// transport-specific -- the host adapter never sees HTTP status codes
// or JSON parse failures directly. The `From<whisker_api::Error>` impl
// translates API-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot reach the vendor cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Robot not found: {identifier}")]
    RobotNotFound { identifier: String },

    #[error("Vendor API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Cache unavailable: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from API-layer errors ─────────────────────────────────

impl From<whisker_api::Error> for CoreError {
    fn from(err: whisker_api::Error) -> Self {
        match err {
            whisker_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            whisker_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            whisker_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            whisker_api::Error::ClientBuild(reason) => CoreError::ConnectionFailed { reason },
            whisker_api::Error::Api { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            whisker_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("deserialization error: {message}"))
            }
            whisker_api::Error::Cache(e) => CoreError::Cache {
                message: e.to_string(),
            },
        }
    }
}
