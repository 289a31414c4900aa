//! Request/response shapes and the service facade that answers them.
//!
//! Field names are camelCase on the wire. Every operation takes `&self`, so a
//! single `BallotService` can be shared across request handlers.

use crate::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdentityRequest {
    #[serde(default)]
    pub voter_id: String,

    #[serde(default)]
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdentityResponse {
    pub eligible: bool,
    pub bound: bool,
    pub address: Option<Address>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BindWalletRequest {
    #[serde(default)]
    pub voter_id: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub wallet_address: String,

    /// A wallet binding intent (see `Intent`) signed by `wallet_address`
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub signature: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BindWalletResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    pub success: bool,
    pub proof_id: ProofId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyProofResponse {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_id: Option<ProofId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyProofResponse {
    fn valid(record: AuditRecord) -> Self {
        VerifyProofResponse {
            valid: true,
            proof_id: Some(record.proof_id),
            timestamp: Some(iso_timestamp(&record.timestamp)),
            action_type: Some(record.action_type),
            wallet_address: record.wallet_address,
            message: None,
        }
    }

    fn invalid() -> Self {
        VerifyProofResponse {
            valid: false,
            proof_id: None,
            timestamp: None,
            action_type: None,
            wallet_address: None,
            message: Some("Invalid or non-existent Proof ID.".to_owned()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatusResponse {
    pub phase: Phase,
    pub demo_mode: bool,

    #[serde(with = "IsoMillis")]
    pub start_time: DateTime<Utc>,

    #[serde(with = "IsoMillis")]
    pub end_time: DateTime<Utc>,
}

/// The vote-casting and proof-ledger subsystem behind one handle
pub struct BallotService<S> {
    store: Arc<S>,
    config: ElectionConfig,
    clock: ElectionClock,
    binding: WalletBindingService<S>,
    engine: VoteCastingEngine<S>,
    ledger: ProofLedger<S>,
}

impl<S: LedgerStore> BallotService<S> {
    pub fn new(store: Arc<S>, config: ElectionConfig) -> Self {
        let clock = ElectionClock::new(config.window.clone());
        let replay = Arc::new(ReplayGuard::new(config.max_message_age()));

        BallotService {
            binding: WalletBindingService::new(store.clone(), replay.clone()),
            engine: VoteCastingEngine::new(
                store.clone(),
                clock.clone(),
                replay,
                config.require_wallet_binding,
            ),
            ledger: ProofLedger::new(store.clone()),
            clock,
            config,
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn verify_identity(
        &self,
        request: &VerifyIdentityRequest,
    ) -> Result<VerifyIdentityResponse, Error> {
        if request.voter_id.trim().is_empty() {
            return Err(Error::MissingField("voterId"));
        }
        if request.token.is_empty() {
            return Err(Error::MissingField("token"));
        }

        let status = self.binding.status(&request.voter_id, &request.token)?;
        Ok(VerifyIdentityResponse {
            eligible: status.eligible,
            bound: status.wallet_address.is_some(),
            address: status.wallet_address,
        })
    }

    pub fn bind_wallet(&self, request: &BindWalletRequest) -> Result<BindWalletResponse, Error> {
        self.bind_wallet_at(request, Utc::now())
    }

    pub fn bind_wallet_at(
        &self,
        request: &BindWalletRequest,
        now: DateTime<Utc>,
    ) -> Result<BindWalletResponse, Error> {
        let required: [(&'static str, &str); 5] = [
            ("voterId", request.voter_id.trim()),
            ("token", request.token.as_str()),
            ("walletAddress", request.wallet_address.trim()),
            ("message", request.message.as_str()),
            ("signature", request.signature.trim()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(Error::MissingField(*name));
        }

        let address: Address = request.wallet_address.parse()?;
        self.binding.bind(
            &request.voter_id,
            &request.token,
            &address,
            &request.message,
            &request.signature,
            now,
        )?;
        Ok(BindWalletResponse { success: true })
    }

    pub fn cast_vote(&self, request: &CastVoteRequest) -> Result<CastVoteResponse, Error> {
        self.cast_vote_at(request, Utc::now())
    }

    pub fn cast_vote_at(
        &self,
        request: &CastVoteRequest,
        now: DateTime<Utc>,
    ) -> Result<CastVoteResponse, Error> {
        let proof_id = self.engine.cast(request, now)?;
        Ok(CastVoteResponse {
            success: true,
            proof_id,
        })
    }

    /// Unknown proof ids are answered with `valid: false`, not an error
    pub fn verify_proof(&self, proof_id: &str) -> Result<VerifyProofResponse, Error> {
        match self.ledger.lookup(proof_id) {
            Ok(record) => Ok(VerifyProofResponse::valid(record)),
            Err(Error::ProofNotFound(_)) => Ok(VerifyProofResponse::invalid()),
            Err(e) => Err(e),
        }
    }

    pub fn election_status(&self) -> ElectionStatusResponse {
        self.election_status_at(Utc::now())
    }

    pub fn election_status_at(&self, now: DateTime<Utc>) -> ElectionStatusResponse {
        let window = self.clock.window();
        ElectionStatusResponse {
            phase: self.clock.phase(now),
            demo_mode: self.clock.is_always_open(),
            start_time: window.start,
            end_time: window.end,
        }
    }

    /// Candidates with their current counters
    pub fn results(&self) -> Result<Vec<Candidate>, Error> {
        Ok(self.store.list_candidates()?)
    }

    /// Read-only export of the audit log for external cross-checking
    pub fn audit_log(&self) -> Result<Vec<AuditRecord>, Error> {
        self.ledger.list_all()
    }
}
