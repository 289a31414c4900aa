use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::fmt;
use subtle::ConstantTimeEq;

/// An eligible voter, provisioned before any cast traffic
///
/// `used` only ever moves false -> true and `wallet_address` only ever moves
/// `None` -> `Some`. `version` is bumped by the store on every successful
/// compare-and-swap and is what concurrent writers race on.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: String,

    /// One-time bearer credential
    pub token: String,

    #[serde(default)]
    pub used: bool,

    #[serde(default)]
    pub wallet_address: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub version: u64,
}

/// Where a voter stands in the casting state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterState {
    Unverified,
    Bound,
    Voted,
}

impl Voter {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Voter {
            id: id.into(),
            token: token.into(),
            used: false,
            wallet_address: None,
            name: None,
            version: 0,
        }
    }

    /// Constant-time comparison of a presented credential against the stored one
    pub fn token_matches(&self, presented: &str) -> bool {
        self.token.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    pub fn state(&self) -> VoterState {
        if self.used {
            VoterState::Voted
        } else if self.wallet_address.is_some() {
            VoterState::Bound
        } else {
            VoterState::Unverified
        }
    }
}

/// A ballot option. Display metadata is opaque to the core.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: u32,

    #[serde(default)]
    pub votes: u64,

    #[serde(flatten)]
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: u32, name: &str) -> Self {
        let mut metadata = IndexMap::new();
        metadata.insert("name".to_owned(), serde_json::Value::from(name));
        Candidate {
            id,
            votes: 0,
            metadata,
        }
    }
}

/// Content-derived receipt identifier, a lower-case hex SHA-256 digest
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ProofId(String);

impl ProofId {
    pub fn from_digest(digest: &[u8]) -> Self {
        ProofId(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProofId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ProofId({})", self.0)
    }
}

/// Which action an audit record attests to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    VoteCast,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActionType::VoteCast => write!(f, "VOTE_CAST"),
        }
    }
}

/// A cast ballot. Append-only.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BallotRecord {
    pub candidate_id: u32,

    #[serde(with = "IsoMillis")]
    pub timestamp: DateTime<Utc>,

    pub proof_id: ProofId,
}

/// Publicly verifiable receipt. Append-only.
///
/// Carries neither voter identity nor candidate choice.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub proof_id: ProofId,

    #[serde(with = "IsoMillis")]
    pub timestamp: DateTime<Utc>,

    pub action_type: ActionType,

    #[serde(default)]
    pub wallet_address: Option<Address>,
}
