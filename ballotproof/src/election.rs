use crate::*;
use chrono::{DateTime, Duration, Utc};

/// Seconds a signed message stays acceptable on either side of "now"
pub const DEFAULT_MAX_MESSAGE_AGE_SECS: i64 = 300;

/// Largest accepted message age; larger configured values are clamped to it
pub const MAX_MESSAGE_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// The configured voting window
///
/// Read-only configuration; never persisted per request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionWindow {
    #[serde(with = "IsoMillis")]
    pub start: DateTime<Utc>,

    #[serde(with = "IsoMillis")]
    pub end: DateTime<Utc>,

    /// Demonstration override that holds the window permanently open.
    ///
    /// This is an explicit bypass of the time gate, not a fallback.
    #[serde(default)]
    pub always_open: bool,
}

impl ElectionWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        ElectionWindow {
            start,
            end,
            always_open: false,
        }
    }

    /// Same window, with the demonstration override switched on or off
    pub fn with_always_open(mut self, always_open: bool) -> Self {
        self.always_open = always_open;
        self
    }

    /// A window that starts before it ends
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

/// Election settings shared by every service
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionConfig {
    pub window: ElectionWindow,

    /// When false, a voter with no bound wallet may still cast a ballot signed by the
    /// claimed address. A bound voter must always sign with the bound wallet.
    #[serde(default = "default_require_wallet_binding")]
    pub require_wallet_binding: bool,

    /// Maximum distance between a signed message's timestamp and the time it is processed
    #[serde(default = "default_max_message_age_secs")]
    pub max_message_age_secs: i64,
}

impl ElectionConfig {
    pub fn new(window: ElectionWindow) -> Self {
        ElectionConfig {
            window,
            require_wallet_binding: default_require_wallet_binding(),
            max_message_age_secs: default_max_message_age_secs(),
        }
    }

    /// The message age window, clamped to `0..=MAX_MESSAGE_AGE_SECS`
    pub fn max_message_age(&self) -> Duration {
        Duration::seconds(self.max_message_age_secs.clamp(0, MAX_MESSAGE_AGE_SECS))
    }
}

fn default_require_wallet_binding() -> bool {
    true
}

fn default_max_message_age_secs() -> i64 {
    DEFAULT_MAX_MESSAGE_AGE_SECS
}
