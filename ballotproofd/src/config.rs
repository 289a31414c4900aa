use ballotproof::{parse_iso_timestamp, ElectionConfig, ElectionWindow, MAX_MESSAGE_AGE_SECS};
use chrono::{DateTime, Utc};
use std::env::var;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_ELECTION_START: &str = "2026-02-13T10:00:00Z";
const DEFAULT_ELECTION_END: &str = "2026-02-14T10:00:00Z";

pub struct Config {
    pub db_path: PathBuf,
    pub seed_path: Option<PathBuf>,
    pub election: ElectionConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ballotproofd: {0} is not an RFC 3339 timestamp: {1}")]
    InvalidTimestamp(&'static str, String),

    #[error("ballotproofd: {0} must be true or false, got {1}")]
    InvalidBool(&'static str, String),

    #[error("ballotproofd: {0} must be a number of seconds between 1 and 604800, got {1}")]
    InvalidSeconds(&'static str, String),

    #[error("ballotproofd: election ends before it starts")]
    BackwardsWindow,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path: PathBuf = match var("BALLOTPROOF_DB_PATH") {
            Ok(val) => val.into(),
            Err(_e) => "./ballotproof.json".into(),
        };

        let seed_path = var("BALLOTPROOF_SEED_PATH").ok().map(PathBuf::from);

        let start = timestamp_var("BALLOTPROOF_ELECTION_START", DEFAULT_ELECTION_START)?;
        let end = timestamp_var("BALLOTPROOF_ELECTION_END", DEFAULT_ELECTION_END)?;
        let demo_mode = bool_var("BALLOTPROOF_DEMO_MODE", false)?;

        let window = ElectionWindow::new(start, end).with_always_open(demo_mode);
        if !window.is_well_formed() {
            return Err(ConfigError::BackwardsWindow);
        }

        let mut election = ElectionConfig::new(window);
        election.require_wallet_binding = bool_var("BALLOTPROOF_REQUIRE_BINDING", true)?;

        if let Ok(val) = var("BALLOTPROOF_MAX_MESSAGE_AGE_SECS") {
            election.max_message_age_secs = parse_max_age(&val).ok_or(
                ConfigError::InvalidSeconds("BALLOTPROOF_MAX_MESSAGE_AGE_SECS", val),
            )?;
        }

        Ok(Config {
            db_path,
            seed_path,
            election,
        })
    }
}

fn timestamp_var(name: &'static str, default: &str) -> Result<DateTime<Utc>, ConfigError> {
    let val = var(name).unwrap_or_else(|_| default.to_owned());
    parse_iso_timestamp(&val).ok_or(ConfigError::InvalidTimestamp(name, val))
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match var(name) {
        Ok(val) => parse_bool(&val).ok_or(ConfigError::InvalidBool(name, val)),
        Err(_e) => Ok(default),
    }
}

fn parse_max_age(val: &str) -> Option<i64> {
    match val.trim().parse::<i64>() {
        Ok(secs) if (1..=MAX_MESSAGE_AGE_SECS).contains(&secs) => Some(secs),
        _ => None,
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
