//! Signed intents
//!
//! A wallet signs a small line-oriented message stating what it authorises.
//! Each message names the voter (and, for a cast, the candidate), a timestamp,
//! and a single-use nonce, so a captured signature cannot be replayed against
//! another voter, another candidate, or at a later time.

use crate::*;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

pub const BIND_WALLET_HEADER: &str = "ballotproof:bind-wallet";
pub const CAST_VOTE_HEADER: &str = "ballotproof:cast-vote";

const MIN_NONCE_HEX_LEN: usize = 16;

/// What a signed message authorises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    BindWallet,
    CastVote { candidate_id: u32 },
}

/// A parsed signed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub kind: IntentKind,
    pub voter_id: String,
    pub timestamp: DateTime<Utc>,
    pub nonce: String,
}

impl Intent {
    pub fn bind_wallet(voter_id: &str, timestamp: DateTime<Utc>, nonce: &str) -> Self {
        Intent {
            kind: IntentKind::BindWallet,
            voter_id: voter_id.to_owned(),
            timestamp,
            nonce: nonce.to_owned(),
        }
    }

    pub fn cast_vote(
        voter_id: &str,
        candidate_id: u32,
        timestamp: DateTime<Utc>,
        nonce: &str,
    ) -> Self {
        Intent {
            kind: IntentKind::CastVote { candidate_id },
            voter_id: voter_id.to_owned(),
            timestamp,
            nonce: nonce.to_owned(),
        }
    }

    /// Parse the canonical message text
    pub fn parse(message: &str) -> Result<Self, Error> {
        let mut lines = message.lines();
        let header = lines.next().unwrap_or("");

        let kind_is_cast = match header {
            BIND_WALLET_HEADER => false,
            CAST_VOTE_HEADER => true,
            _ => return Err(malformed("unknown message header")),
        };

        let voter_id = field(lines.next(), "voter")?;
        if voter_id.is_empty() {
            return Err(malformed("empty voter"));
        }

        let kind = if kind_is_cast {
            let candidate_id = field(lines.next(), "candidate")?
                .parse()
                .map_err(|_| malformed("candidate is not a number"))?;
            IntentKind::CastVote { candidate_id }
        } else {
            IntentKind::BindWallet
        };

        let timestamp = parse_iso_timestamp(field(lines.next(), "timestamp")?)
            .ok_or_else(|| malformed("invalid timestamp"))?;

        let nonce = field(lines.next(), "nonce")?;
        if nonce.len() < MIN_NONCE_HEX_LEN || !nonce.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed("nonce must be at least 8 random bytes of hex"));
        }

        if lines.any(|line| !line.trim().is_empty()) {
            return Err(malformed("unexpected trailing content"));
        }

        Ok(Intent {
            kind,
            voter_id: voter_id.to_owned(),
            timestamp,
            nonce: nonce.to_owned(),
        })
    }

    /// Require this to be a binding intent for `voter_id`
    pub fn expect_bind_wallet(&self, voter_id: &str) -> Result<(), Error> {
        if self.kind != IntentKind::BindWallet {
            return Err(Error::MessageMismatch("not a wallet binding message"));
        }
        if self.voter_id != voter_id {
            return Err(Error::MessageMismatch("voter"));
        }
        Ok(())
    }

    /// Require this to be a cast intent for `voter_id` choosing `candidate_id`
    pub fn expect_cast_vote(&self, voter_id: &str, candidate_id: u32) -> Result<(), Error> {
        match self.kind {
            IntentKind::CastVote { candidate_id: signed } if signed == candidate_id => {}
            IntentKind::CastVote { .. } => return Err(Error::MessageMismatch("candidate")),
            IntentKind::BindWallet => return Err(Error::MessageMismatch("not a vote message")),
        }
        if self.voter_id != voter_id {
            return Err(Error::MessageMismatch("voter"));
        }
        Ok(())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            IntentKind::BindWallet => {
                writeln!(f, "{}", BIND_WALLET_HEADER)?;
                writeln!(f, "voter:{}", self.voter_id)?;
            }
            IntentKind::CastVote { candidate_id } => {
                writeln!(f, "{}", CAST_VOTE_HEADER)?;
                writeln!(f, "voter:{}", self.voter_id)?;
                writeln!(f, "candidate:{}", candidate_id)?;
            }
        }
        writeln!(f, "timestamp:{}", iso_timestamp(&self.timestamp))?;
        write!(f, "nonce:{}", self.nonce)
    }
}

fn field<'a>(line: Option<&'a str>, key: &'static str) -> Result<&'a str, Error> {
    let line = line.ok_or_else(|| Error::MalformedMessage(format!("missing {}", key)))?;
    match line.split_once(':') {
        Some((k, v)) if k == key => Ok(v.trim()),
        _ => Err(Error::MalformedMessage(format!("expected {}", key))),
    }
}

fn malformed(reason: &str) -> Error {
    Error::MalformedMessage(reason.to_owned())
}

/// Rejects stale messages and nonces that have already been accepted
///
/// Nonces are remembered only while their timestamp is inside the age window;
/// anything older is refused as stale before the nonce is consulted.
pub struct ReplayGuard {
    max_age: Duration,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReplayGuard {
    pub fn new(max_age: Duration) -> Self {
        ReplayGuard {
            max_age,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Fail if `intent` is outside the age window at `now` or its nonce was already accepted
    pub fn check(&self, intent: &Intent, now: DateTime<Utc>) -> Result<(), Error> {
        // An age window reaching past the representable range is open on that side
        let earliest = now.checked_sub_signed(self.max_age);
        let latest = now.checked_add_signed(self.max_age);
        let too_old = earliest.map_or(false, |earliest| intent.timestamp < earliest);
        let too_new = latest.map_or(false, |latest| intent.timestamp > latest);
        if too_old || too_new {
            return Err(Error::StaleMessage);
        }

        let mut seen = self.seen.lock();
        if let Some(earliest) = earliest {
            seen.retain(|_, timestamp| *timestamp >= earliest);
        }

        if seen.contains_key(&intent.nonce) {
            return Err(Error::NonceReused);
        }
        Ok(())
    }

    /// Remember the nonce of an intent whose effect has been committed
    pub fn record(&self, intent: &Intent) {
        self.seen.lock().insert(intent.nonce.clone(), intent.timestamp);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
