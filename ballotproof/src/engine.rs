use crate::*;
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// How many times a cast re-reads the voter after losing a write race before giving up
pub const MAX_COMMIT_ATTEMPTS: usize = 16;

/// A ballot as submitted by a client
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(default)]
    pub voter_id: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub candidate_id: Option<u32>,

    #[serde(default)]
    pub wallet_address: String,

    /// A cast intent (see `Intent`) signed by `wallet_address`
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub signature: String,
}

/// Orchestrates eligibility checks, signature verification and exactly-once casting
pub struct VoteCastingEngine<S> {
    store: Arc<S>,
    clock: ElectionClock,
    replay: Arc<ReplayGuard>,
    require_wallet_binding: bool,
}

impl<S: LedgerStore> VoteCastingEngine<S> {
    pub fn new(
        store: Arc<S>,
        clock: ElectionClock,
        replay: Arc<ReplayGuard>,
        require_wallet_binding: bool,
    ) -> Self {
        VoteCastingEngine {
            store,
            clock,
            replay,
            require_wallet_binding,
        }
    }

    /// Cast a ballot, returning the proof id of its receipt
    ///
    /// The voter's `used` flag, the candidate counter, the ballot and the audit
    /// record are written as one unit. If that write fails nothing is visible and
    /// the whole request may be retried.
    pub fn cast(&self, request: &CastVoteRequest, now: DateTime<Utc>) -> Result<ProofId, Error> {
        self.clock.ensure_ongoing(now)?;

        let candidate_id = require_fields(request)?;
        let claimed_address: Address = request.wallet_address.parse()?;

        verify_signer(&request.message, &request.signature, &claimed_address)?;
        let intent = Intent::parse(&request.message)?;
        intent.expect_cast_vote(&request.voter_id, candidate_id)?;
        self.replay.check(&intent, now)?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let voter = self.store.voter(&request.voter_id)?;
            if !voter.token_matches(&request.token) {
                warn!("cast rejected: invalid credential");
                return Err(Error::InvalidCredential);
            }

            match voter.wallet_address {
                Some(bound) if bound != claimed_address => {
                    warn!("cast rejected: wallet {} is not the bound wallet", claimed_address);
                    return Err(Error::WalletMismatch);
                }
                None if self.require_wallet_binding => {
                    warn!("cast rejected: no wallet bound");
                    return Err(Error::WalletNotBound);
                }
                _ => {}
            }

            if voter.used {
                warn!("cast rejected: double vote attempt from {}", claimed_address);
                return Err(Error::DoubleVoteRejected);
            }

            let commit = build_commit(
                &voter,
                candidate_id,
                &claimed_address,
                &request.signature,
                now,
            );
            let proof_id = commit.audit.proof_id.clone();

            match self.store.commit_cast(commit) {
                Ok(CommitOutcome::Committed) => {
                    self.replay.record(&intent);
                    info!("ballot recorded with proof {}", proof_id);
                    return Ok(proof_id);
                }
                Ok(CommitOutcome::CandidateMissing) => {
                    return Err(Error::CandidateNotFound(candidate_id));
                }
                Ok(CommitOutcome::VoterConflict) => {
                    warn!(
                        "cast lost a write race (attempt {} of {}), re-reading voter",
                        attempt, MAX_COMMIT_ATTEMPTS
                    );
                }
                Err(e) => {
                    error!("cast failed to persist: {}", e);
                    return Err(e.into());
                }
            }
        }

        Err(StoreError::Contention(MAX_COMMIT_ATTEMPTS).into())
    }
}

fn require_fields(request: &CastVoteRequest) -> Result<u32, Error> {
    if request.voter_id.trim().is_empty() {
        return Err(Error::MissingField("voterId"));
    }
    if request.token.is_empty() {
        return Err(Error::MissingField("token"));
    }
    let candidate_id = request.candidate_id.ok_or(Error::MissingField("candidateId"))?;
    if request.wallet_address.trim().is_empty() {
        return Err(Error::MissingField("walletAddress"));
    }
    if request.message.is_empty() {
        return Err(Error::MissingField("message"));
    }
    if request.signature.trim().is_empty() {
        return Err(Error::MissingField("signature"));
    }
    Ok(candidate_id)
}

// The receipt is derived from a fresh context id and nonce; the voter and the
// candidate are kept out of the audit record entirely.
fn build_commit(
    voter: &Voter,
    candidate_id: u32,
    address: &Address,
    signature: &str,
    now: DateTime<Utc>,
) -> CastCommit {
    let timestamp = now.trunc_subsecs(3);
    let context_id = Uuid::new_v4().to_string();
    let nonce = generate_nonce();

    let proof_id = issue_proof(
        &context_id,
        &iso_timestamp(&timestamp),
        &nonce,
        Some(address),
        Some(signature),
    );

    CastCommit {
        voter_id: voter.id.clone(),
        expected_version: voter.version,
        ballot: BallotRecord {
            candidate_id,
            timestamp,
            proof_id: proof_id.clone(),
        },
        audit: AuditRecord {
            proof_id,
            timestamp,
            action_type: ActionType::VoteCast,
            wallet_address: Some(*address),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use k256::ecdsa::SigningKey;

    struct Fixture {
        store: Arc<MemStore>,
        engine: VoteCastingEngine<MemStore>,
        key: SigningKey,
        address: Address,
        now: DateTime<Utc>,
    }

    fn fixture(require_wallet_binding: bool) -> Fixture {
        let now = Utc::now();
        let (key, address) = generate_wallet();

        let mut bound = Voter::new("V1", "T1");
        bound.wallet_address = Some(address);

        let store = Arc::new(MemStore::new());
        store.insert_voter(bound);
        store.insert_voter(Voter::new("V2", "T2"));
        store.insert_candidate(Candidate::new(1, "Ivanvo"));
        store.insert_candidate(Candidate::new(2, "Kabilashini"));

        let window = ElectionWindow::new(now - Duration::hours(1), now + Duration::hours(1));
        let engine = VoteCastingEngine::new(
            store.clone(),
            ElectionClock::new(window),
            Arc::new(ReplayGuard::new(Duration::seconds(DEFAULT_MAX_MESSAGE_AGE_SECS))),
            require_wallet_binding,
        );

        Fixture {
            store,
            engine,
            key,
            address,
            now,
        }
    }

    fn request(
        key: &SigningKey,
        address: &Address,
        voter_id: &str,
        token: &str,
        candidate_id: u32,
        now: DateTime<Utc>,
    ) -> CastVoteRequest {
        let message = Intent::cast_vote(voter_id, candidate_id, now, &generate_nonce()).to_string();
        CastVoteRequest {
            voter_id: voter_id.to_owned(),
            token: token.to_owned(),
            candidate_id: Some(candidate_id),
            wallet_address: address.to_string(),
            signature: sign_message(key, &message).unwrap(),
            message,
        }
    }

    fn counters(store: &MemStore) -> Vec<u64> {
        store
            .list_candidates()
            .unwrap()
            .into_iter()
            .map(|c| c.votes)
            .collect()
    }

    #[test]
    fn cast_then_double_vote() {
        let f = fixture(true);

        let req = request(&f.key, &f.address, "V1", "T1", 1, f.now);
        let proof_id = f.engine.cast(&req, f.now).unwrap();

        let audit = f.store.find_audit_by_proof(proof_id.as_str()).unwrap().unwrap();
        assert_eq!(audit.wallet_address, Some(f.address));
        assert_eq!(audit.action_type, ActionType::VoteCast);
        assert_eq!(f.store.list_ballots().unwrap()[0].candidate_id, 1);
        assert!(f.store.voter("V1").unwrap().used);

        let again = request(&f.key, &f.address, "V1", "T1", 2, f.now);
        assert!(matches!(
            f.engine.cast(&again, f.now),
            Err(Error::DoubleVoteRejected)
        ));
        assert_eq!(counters(&f.store), vec![1, 0]);
    }

    #[test]
    fn gate_order() {
        let f = fixture(true);
        let good = request(&f.key, &f.address, "V1", "T1", 1, f.now);

        // Outside the window nothing else is even looked at
        let mut empty = CastVoteRequest::default();
        assert!(matches!(
            f.engine.cast(&empty, f.now + Duration::hours(2)),
            Err(Error::ElectionNotActive(Phase::Closed))
        ));
        assert!(matches!(
            f.engine.cast(&empty, f.now),
            Err(Error::MissingField("voterId"))
        ));
        empty.voter_id = "V1".into();
        empty.token = "T1".into();
        assert!(matches!(
            f.engine.cast(&empty, f.now),
            Err(Error::MissingField("candidateId"))
        ));

        let mut unsigned = good.clone();
        unsigned.signature.clear();
        assert!(matches!(
            f.engine.cast(&unsigned, f.now),
            Err(Error::MissingField("signature"))
        ));

        let mut garbled = good.clone();
        garbled.signature = "0xdeadbeef".into();
        assert!(matches!(
            f.engine.cast(&garbled, f.now),
            Err(Error::MalformedSignature(_))
        ));

        let mut wrong_token = good.clone();
        wrong_token.token = "T2".into();
        assert!(matches!(
            f.engine.cast(&wrong_token, f.now),
            Err(Error::InvalidCredential)
        ));

        let ghost = request(&f.key, &f.address, "V404", "T1", 1, f.now);
        assert!(matches!(
            f.engine.cast(&ghost, f.now),
            Err(Error::VoterNotFound)
        ));

        let missing_candidate = request(&f.key, &f.address, "V1", "T1", 99, f.now);
        assert!(matches!(
            f.engine.cast(&missing_candidate, f.now),
            Err(Error::CandidateNotFound(99))
        ));

        assert_eq!(counters(&f.store), vec![0, 0]);
        assert!(!f.store.voter("V1").unwrap().used);
    }

    #[test]
    fn signature_gate_never_mutates() {
        let f = fixture(true);
        let (intruder_key, intruder) = generate_wallet();

        // Signed by the intruder but claiming the bound address
        let mut forged = request(&intruder_key, &intruder, "V1", "T1", 1, f.now);
        forged.wallet_address = f.address.to_string();
        assert!(matches!(
            f.engine.cast(&forged, f.now),
            Err(Error::SignatureMismatch)
        ));

        // Validly signed by an address that is not the bound one
        let honest_intruder = request(&intruder_key, &intruder, "V1", "T1", 1, f.now);
        assert!(matches!(
            f.engine.cast(&honest_intruder, f.now),
            Err(Error::WalletMismatch)
        ));

        assert_eq!(counters(&f.store), vec![0, 0]);
        assert!(f.store.list_audit().unwrap().is_empty());
    }

    #[test]
    fn captured_signature_cannot_be_redirected() {
        let f = fixture(true);
        let signed_for_one = request(&f.key, &f.address, "V1", "T1", 1, f.now);

        let mut redirected = signed_for_one.clone();
        redirected.candidate_id = Some(2);
        assert!(matches!(
            f.engine.cast(&redirected, f.now),
            Err(Error::MessageMismatch("candidate"))
        ));

        assert!(matches!(
            f.engine.cast(&signed_for_one, f.now + Duration::minutes(30)),
            Err(Error::StaleMessage)
        ));
    }

    #[test]
    fn unbound_voter_needs_binding_unless_configured_otherwise() {
        let f = fixture(true);
        let (key, address) = generate_wallet();
        let req = request(&key, &address, "V2", "T2", 2, f.now);
        assert!(matches!(
            f.engine.cast(&req, f.now),
            Err(Error::WalletNotBound)
        ));

        let f = fixture(false);
        let req = request(&key, &address, "V2", "T2", 2, f.now);
        let proof_id = f.engine.cast(&req, f.now).unwrap();
        assert_eq!(
            f.store.find_audit_by_proof(proof_id.as_str()).unwrap().unwrap().wallet_address,
            Some(address)
        );

        // A bound voter still has to use the bound wallet
        let req = request(&key, &address, "V1", "T1", 2, f.now);
        assert!(matches!(
            f.engine.cast(&req, f.now),
            Err(Error::WalletMismatch)
        ));
    }

    #[test]
    fn upcoming_election_rejects_without_mutation() {
        let f = fixture(true);
        let before = f.now - Duration::hours(2);
        let req = request(&f.key, &f.address, "V1", "T1", 1, before);

        assert!(matches!(
            f.engine.cast(&req, before),
            Err(Error::ElectionNotActive(Phase::Upcoming))
        ));
        assert_eq!(counters(&f.store), vec![0, 0]);
        assert!(!f.store.voter("V1").unwrap().used);
    }

    #[test]
    fn request_wire_shape() {
        let json = r#"{"voterId":"V1","token":"T1","candidateId":2,"walletAddress":"0xabc"}"#;
        let req: CastVoteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.candidate_id, Some(2));
        assert!(req.message.is_empty());
        assert!(req.signature.is_empty());
    }
}
