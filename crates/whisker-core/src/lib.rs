// whisker-core: Reconciliation layer between whisker-api and the
// smart-home host adapter.

pub mod config;
pub mod error;
pub mod hub;
pub mod projection;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    BridgeConfig, Credentials, DEFAULT_CACHE_TTL, DEFAULT_POLL_INTERVAL, VendorEndpoints,
};
pub use error::CoreError;
pub use hub::{AccessoryHub, Characteristic, CharacteristicValue, SwitchKind, stable_uuid};
pub use projection::StatusProjection;
pub use sync::{SyncController, SyncSummary};

// Re-export the API-layer types hosts commonly touch.
pub use whisker_api::{Command, Robot};
