use crate::*;

use thiserror::Error;

/// Broad failure classes
///
/// Callers use the kind to tell "fix the request" apart from "try again";
/// only `Storage` failures are safe to retry, and only as a whole new request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    StateConflict,
    NotFound,
    Storage,
}

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("ballotproof: election is not active (phase: {0})")]
    ElectionNotActive(Phase),

    #[error("ballotproof: missing required field: {0}")]
    MissingField(&'static str),

    #[error("ballotproof: invalid wallet address: {0:?}")]
    InvalidAddress(String),

    #[error("ballotproof: malformed signature: {0}")]
    MalformedSignature(String),

    #[error("ballotproof: malformed signed message: {0}")]
    MalformedMessage(String),

    #[error("ballotproof: signature does not match the claimed wallet address")]
    SignatureMismatch,

    #[error("ballotproof: signed message does not match the request: {0}")]
    MessageMismatch(&'static str),

    #[error("ballotproof: signed message timestamp is outside the accepted window")]
    StaleMessage,

    #[error("ballotproof: signed message nonce has already been used")]
    NonceReused,

    #[error("ballotproof: voter not found")]
    VoterNotFound,

    #[error("ballotproof: invalid credential")]
    InvalidCredential,

    #[error("ballotproof: no wallet is bound to this voter")]
    WalletNotBound,

    #[error("ballotproof: wallet address does not match the bound wallet")]
    WalletMismatch,

    #[error("ballotproof: a wallet is already bound to this voter")]
    AlreadyBound,

    #[error("ballotproof: double voting detected, vote rejected")]
    DoubleVoteRejected,

    #[error("ballotproof: candidate {0} not found")]
    CandidateNotFound(u32),

    #[error("ballotproof: proof {0} not found")]
    ProofNotFound(String),

    #[error("ballotproof: storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingField(_)
            | Error::InvalidAddress(_)
            | Error::MalformedSignature(_)
            | Error::MalformedMessage(_) => ErrorKind::Validation,

            Error::SignatureMismatch
            | Error::MessageMismatch(_)
            | Error::StaleMessage
            | Error::NonceReused
            | Error::InvalidCredential
            | Error::WalletNotBound
            | Error::WalletMismatch => ErrorKind::Authentication,

            Error::ElectionNotActive(_) | Error::AlreadyBound | Error::DoubleVoteRejected => {
                ErrorKind::StateConflict
            }

            Error::VoterNotFound | Error::CandidateNotFound(_) | Error::ProofNotFound(_) => {
                ErrorKind::NotFound
            }

            Error::StorageFailure(_) => ErrorKind::Storage,
        }
    }

    /// Whether the client may resubmit the entire request unchanged (apart from a fresh nonce)
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

/// Ledger store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ballotproof store: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ballotproof store: serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ballotproof store: record {0} already exists")]
    DuplicateRecord(String),

    #[error("ballotproof store: gave up after {0} conflicting writes")]
    Contention(usize),

    #[error("ballotproof store: unavailable: {0}")]
    Unavailable(String),
}
