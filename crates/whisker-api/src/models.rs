// Wire types for the Whisker cloud API
//
// The vendor API is inconsistent across firmware generations: counts
// arrive as JSON numbers or as strings, and timestamps come in several
// near-ISO shapes. Deserializers here coerce rather than reject -- a
// single odd field must not sink a whole device list.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Identity ─────────────────────────────────────────────────────────

/// Token grant response from the vendor SSO.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Account profile envelope from `GET /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub user: UserProfile,
}

/// The account itself. Robot and command endpoints are scoped by
/// `user_id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

// ── Robot ────────────────────────────────────────────────────────────

/// One litter robot from `GET /users/{userId}/robots`.
///
/// An immutable snapshot -- every fetch produces a fresh set of
/// records keyed by `id`. Commonly needed fields are modeled
/// explicitly; everything else lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Robot {
    #[serde(rename = "litterRobotId")]
    pub id: String,
    #[serde(rename = "litterRobotNickname", default)]
    pub nickname: String,
    #[serde(rename = "litterRobotSerial", default)]
    pub serial: String,
    /// Short firmware status token: READY, CCP, DF1, OFF, offline, ...
    #[serde(default)]
    pub unit_status: String,
    /// Boolean-as-string: `"1"` when the night light is on.
    #[serde(default)]
    pub night_light_active: String,
    /// Boolean-as-string: `"1"` when the control panel is locked.
    #[serde(default)]
    pub panel_lock_active: String,
    #[serde(default)]
    pub power_status: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default, deserialize_with = "flexible_u32")]
    pub cycle_count: u32,
    #[serde(default, deserialize_with = "flexible_u32")]
    pub cycle_capacity: u32,
    #[serde(default, deserialize_with = "flexible_u32")]
    pub cycles_after_drawer_full: u32,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub setup_date: DateTime<Utc>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Dispatchable command codes -- short ASCII tokens consumed by the
/// robot firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartCleaning,
    WaitTime3Minutes,
    WaitTime7Minutes,
    WaitTime15Minutes,
    PowerOff,
    PowerOn,
    NightLightOff,
    NightLightOn,
    SleepModeOff,
    PanelLockOff,
    PanelLockOn,
}

impl Command {
    /// The wire token sent in the dispatch body.
    pub fn code(self) -> &'static str {
        match self {
            Self::StartCleaning => "<C",
            Self::WaitTime3Minutes => "<W3",
            Self::WaitTime7Minutes => "<W7",
            Self::WaitTime15Minutes => "<WF",
            Self::PowerOff => "<P0",
            Self::PowerOn => "<P1",
            Self::NightLightOff => "<N0",
            Self::NightLightOn => "<N1",
            Self::SleepModeOff => "<S0",
            Self::PanelLockOff => "<L0",
            Self::PanelLockOn => "<L1",
        }
    }
}

// ── Lenient deserializers ────────────────────────────────────────────

/// Accept a count as a JSON number or a numeric string; anything else
/// becomes 0.
fn flexible_u32<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(f64),
        Str(String),
    }

    let parsed = match Option::<NumOrString>::deserialize(de)? {
        Some(NumOrString::Num(n)) => n,
        Some(NumOrString::Str(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        None => 0.0,
    };
    if parsed >= 0.0 {
        Ok(parsed as u32)
    } else {
        Ok(0)
    }
}

/// Accept RFC 3339, the vendor's space-separated variant, and bare
/// date-times without a zone. Anything unparseable falls back to now.
fn lenient_timestamp<'de, D>(de: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}
