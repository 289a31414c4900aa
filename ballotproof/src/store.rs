use crate::*;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Everything a successful cast changes, applied as one unit
#[derive(Clone, Debug)]
pub struct CastCommit {
    pub voter_id: String,

    /// The voter version the casting decision was made against
    pub expected_version: u64,

    pub ballot: BallotRecord,
    pub audit: AuditRecord,
}

/// Result of applying a `CastCommit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,

    /// The voter changed (or vanished) since it was read; nothing was written
    VoterConflict,

    /// The ballot names a candidate the store does not hold; nothing was written
    CandidateMissing,
}

/// A ledger store
///
/// Implementations must be durable on successful return, and `commit_cast` must be
/// all-or-nothing: on any error or non-`Committed` outcome no part of the commit is
/// visible to later readers.
pub trait LedgerStore: Send + Sync {
    fn get_voter(&self, id: &str) -> Result<Option<Voter>, StoreError>;

    fn get_candidate(&self, id: u32) -> Result<Option<Candidate>, StoreError>;

    fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    /// Replace the voter if its stored version is still `expected_version`.
    /// The stored copy gets version `expected_version + 1`.
    fn compare_and_swap_voter(
        &self,
        id: &str,
        expected_version: u64,
        new_state: Voter,
    ) -> Result<bool, StoreError>;

    /// Returns the new counter, or `None` if the candidate does not exist
    fn increment_votes(&self, candidate_id: u32) -> Result<Option<u64>, StoreError>;

    fn append_ballot(&self, record: BallotRecord) -> Result<(), StoreError>;

    /// Fails with `DuplicateRecord` rather than overwrite an existing proof
    fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError>;

    fn find_audit_by_proof(&self, proof_id: &str) -> Result<Option<AuditRecord>, StoreError>;

    fn list_audit(&self) -> Result<Vec<AuditRecord>, StoreError>;

    fn list_ballots(&self) -> Result<Vec<BallotRecord>, StoreError>;

    /// Mark the voter used, count the vote, and append the ballot and audit record, atomically
    fn commit_cast(&self, commit: CastCommit) -> Result<CommitOutcome, StoreError>;

    /// Get a voter, or `VoterNotFound`
    fn voter(&self, id: &str) -> Result<Voter, Error> {
        self.get_voter(id)?.ok_or(Error::VoterNotFound)
    }

    /// Get a candidate, or `CandidateNotFound`
    fn candidate(&self, id: u32) -> Result<Candidate, Error> {
        self.get_candidate(id)?.ok_or(Error::CandidateNotFound(id))
    }
}

/// Serialized form of a ledger
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub voters: Vec<Voter>,

    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default)]
    pub votes: Vec<BallotRecord>,

    #[serde(default)]
    pub audit_logs: Vec<AuditRecord>,
}

/// In-memory ledger arena shared by store implementations
///
/// Records are keyed by id; the audit log is indexed by proof id for
/// constant-time lookup and keeps insertion order for export.
#[derive(Clone, Debug, Default)]
pub struct LedgerState {
    voters: IndexMap<String, Voter>,
    candidates: IndexMap<u32, Candidate>,
    ballots: Vec<BallotRecord>,
    audit: IndexMap<ProofId, AuditRecord>,
}

impl LedgerState {
    pub fn voter(&self, id: &str) -> Option<&Voter> {
        self.voters.get(id)
    }

    pub fn candidate(&self, id: u32) -> Option<&Candidate> {
        self.candidates.get(&id)
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        self.candidates.values().cloned().collect()
    }

    /// Provision (or re-seed) a voter
    pub fn insert_voter(&mut self, voter: Voter) {
        self.voters.insert(voter.id.clone(), voter);
    }

    /// Provision (or re-seed) a candidate
    pub fn insert_candidate(&mut self, candidate: Candidate) {
        self.candidates.insert(candidate.id, candidate);
    }

    pub fn swap_voter(&mut self, id: &str, expected_version: u64, mut new_state: Voter) -> bool {
        match self.voters.get_mut(id) {
            Some(current) if current.version == expected_version => {
                new_state.id = current.id.clone();
                new_state.version = expected_version + 1;
                *current = new_state;
                true
            }
            _ => false,
        }
    }

    pub fn increment_votes(&mut self, candidate_id: u32) -> Option<u64> {
        let candidate = self.candidates.get_mut(&candidate_id)?;
        candidate.votes += 1;
        Some(candidate.votes)
    }

    pub fn push_ballot(&mut self, record: BallotRecord) {
        self.ballots.push(record);
    }

    pub fn push_audit(&mut self, record: AuditRecord) -> Result<(), StoreError> {
        if self.audit.contains_key(record.proof_id.as_str()) {
            return Err(StoreError::DuplicateRecord(record.proof_id.to_string()));
        }
        self.audit.insert(record.proof_id.clone(), record);
        Ok(())
    }

    pub fn audit(&self, proof_id: &str) -> Option<&AuditRecord> {
        self.audit.get(proof_id)
    }

    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit.values().cloned().collect()
    }

    pub fn ballots(&self) -> &[BallotRecord] {
        &self.ballots
    }

    /// Apply a cast. Every precondition is checked before anything is mutated.
    pub fn apply_cast(&mut self, commit: CastCommit) -> Result<CommitOutcome, StoreError> {
        match self.voters.get(&commit.voter_id) {
            Some(voter) if voter.version == commit.expected_version && !voter.used => {}
            _ => return Ok(CommitOutcome::VoterConflict),
        }
        if !self.candidates.contains_key(&commit.ballot.candidate_id) {
            return Ok(CommitOutcome::CandidateMissing);
        }
        if self.audit.contains_key(commit.audit.proof_id.as_str()) {
            return Err(StoreError::DuplicateRecord(commit.audit.proof_id.to_string()));
        }

        if let Some(voter) = self.voters.get_mut(&commit.voter_id) {
            voter.used = true;
            voter.version += 1;
        }
        self.increment_votes(commit.ballot.candidate_id);
        self.ballots.push(commit.ballot);
        self.audit.insert(commit.audit.proof_id.clone(), commit.audit);

        Ok(CommitOutcome::Committed)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            voters: self.voters.values().cloned().collect(),
            candidates: self.candidates(),
            votes: self.ballots.clone(),
            audit_logs: self.audit_log(),
        }
    }
}

impl From<LedgerSnapshot> for LedgerState {
    fn from(snapshot: LedgerSnapshot) -> Self {
        let mut state = LedgerState::default();
        for voter in snapshot.voters {
            state.insert_voter(voter);
        }
        for candidate in snapshot.candidates {
            state.insert_candidate(candidate);
        }
        state.ballots = snapshot.votes;
        for record in snapshot.audit_logs {
            // A repeated proof id in a snapshot keeps its first record
            state.audit.entry(record.proof_id.clone()).or_insert(record);
        }
        state
    }
}

/// A simple store that keeps the ledger in memory behind a single lock
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<LedgerState>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    pub fn insert_voter(&self, voter: Voter) {
        self.inner.lock().insert_voter(voter);
    }

    pub fn insert_candidate(&self, candidate: Candidate) {
        self.inner.lock().insert_candidate(candidate);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }
}

impl From<LedgerSnapshot> for MemStore {
    fn from(snapshot: LedgerSnapshot) -> Self {
        MemStore {
            inner: Mutex::new(snapshot.into()),
        }
    }
}

impl LedgerStore for MemStore {
    fn get_voter(&self, id: &str) -> Result<Option<Voter>, StoreError> {
        Ok(self.inner.lock().voter(id).cloned())
    }

    fn get_candidate(&self, id: u32) -> Result<Option<Candidate>, StoreError> {
        Ok(self.inner.lock().candidate(id).cloned())
    }

    fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.inner.lock().candidates())
    }

    fn compare_and_swap_voter(
        &self,
        id: &str,
        expected_version: u64,
        new_state: Voter,
    ) -> Result<bool, StoreError> {
        Ok(self.inner.lock().swap_voter(id, expected_version, new_state))
    }

    fn increment_votes(&self, candidate_id: u32) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.lock().increment_votes(candidate_id))
    }

    fn append_ballot(&self, record: BallotRecord) -> Result<(), StoreError> {
        self.inner.lock().push_ballot(record);
        Ok(())
    }

    fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.inner.lock().push_audit(record)
    }

    fn find_audit_by_proof(&self, proof_id: &str) -> Result<Option<AuditRecord>, StoreError> {
        Ok(self.inner.lock().audit(proof_id).cloned())
    }

    fn list_audit(&self) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self.inner.lock().audit_log())
    }

    fn list_ballots(&self) -> Result<Vec<BallotRecord>, StoreError> {
        Ok(self.inner.lock().ballots().to_vec())
    }

    fn commit_cast(&self, commit: CastCommit) -> Result<CommitOutcome, StoreError> {
        self.inner.lock().apply_cast(commit)
    }
}
