// whisker-api: Async Rust client for the Whisker litter-box cloud API

pub mod cache;
pub mod client;
pub mod error;
pub mod models;
pub mod singleflight;
pub mod token;
pub mod transport;

pub use cache::CacheStore;
pub use client::{ClientConfig, RobotClient};
pub use error::Error;
pub use models::{Command, Robot, TokenResponse, UserProfile, UsersResponse};
pub use singleflight::{Flight, SingleFlightGate};
pub use token::{AccessToken, REFRESH_MARGIN, TokenManager};
pub use transport::TransportConfig;
