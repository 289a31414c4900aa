use crate::config::Config;
use ballotproof::*;
use log::{error, info};
use parking_lot::Mutex;
use rocket::fairing::{self, AdHoc};
use rocket::{Build, Rocket};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type Service = BallotService<FileStore>;

/// Managed handle; handlers clone it into blocking tasks
pub type SharedService = Arc<Service>;

/// A ledger store persisted as a single JSON snapshot
///
/// Every mutation is applied to a copy of the ledger, written to a temporary
/// file, fsynced and renamed over the snapshot. Only then is the copy
/// published, so a write that fails leaves no visible change.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl FileStore {
    /// Open the ledger at `path`, seeding it from `seed` if no snapshot exists yet
    pub fn open(
        path: impl Into<PathBuf>,
        seed: Option<LedgerSnapshot>,
    ) -> Result<Self, StoreError> {
        let path = path.into();

        let state: LedgerState = if path.exists() {
            let snapshot: LedgerSnapshot = serde_json::from_slice(&fs::read(&path)?)?;
            info!(
                "loaded ledger from {}: {} voters, {} candidates, {} audit records",
                path.display(),
                snapshot.voters.len(),
                snapshot.candidates.len(),
                snapshot.audit_logs.len()
            );
            snapshot.into()
        } else {
            info!("creating new ledger at {}", path.display());
            seed.map(LedgerState::from).unwrap_or_default()
        };

        let store = FileStore {
            path,
            state: Mutex::new(state),
        };
        store.flush()?;

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current ledger to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        let state = self.state.lock();
        write_snapshot(&self.path, &state.snapshot())
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        f(&self.state.lock())
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut current = self.state.lock();
        let mut next = current.clone();
        let out = f(&mut next)?;
        write_snapshot(&self.path, &next.snapshot())?;
        *current = next;
        Ok(out)
    }
}

impl LedgerStore for FileStore {
    fn get_voter(&self, id: &str) -> Result<Option<Voter>, StoreError> {
        Ok(self.read(|state| state.voter(id).cloned()))
    }

    fn get_candidate(&self, id: u32) -> Result<Option<Candidate>, StoreError> {
        Ok(self.read(|state| state.candidate(id).cloned()))
    }

    fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.read(|state| state.candidates()))
    }

    fn compare_and_swap_voter(
        &self,
        id: &str,
        expected_version: u64,
        new_state: Voter,
    ) -> Result<bool, StoreError> {
        // A lost race needs no write
        if self.read(|state| state.voter(id).map(|v| v.version)) != Some(expected_version) {
            return Ok(false);
        }
        self.mutate(|state| Ok(state.swap_voter(id, expected_version, new_state)))
    }

    fn increment_votes(&self, candidate_id: u32) -> Result<Option<u64>, StoreError> {
        self.mutate(|state| Ok(state.increment_votes(candidate_id)))
    }

    fn append_ballot(&self, record: BallotRecord) -> Result<(), StoreError> {
        self.mutate(|state| {
            state.push_ballot(record);
            Ok(())
        })
    }

    fn append_audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.mutate(|state| state.push_audit(record))
    }

    fn find_audit_by_proof(&self, proof_id: &str) -> Result<Option<AuditRecord>, StoreError> {
        Ok(self.read(|state| state.audit(proof_id).cloned()))
    }

    fn list_audit(&self) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self.read(|state| state.audit_log()))
    }

    fn list_ballots(&self) -> Result<Vec<BallotRecord>, StoreError> {
        Ok(self.read(|state| state.ballots().to_vec()))
    }

    fn commit_cast(&self, commit: CastCommit) -> Result<CommitOutcome, StoreError> {
        self.mutate(|state| state.apply_cast(commit))
    }
}

fn write_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    sync_dir(parent_dir(path))?;

    Ok(())
}

// The rename is only durable once the directory entry itself is on disk
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn load_seed(path: &Path) -> Result<LedgerSnapshot, StoreError> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

async fn init_store(rocket: Rocket<Build>, config: Config) -> fairing::Result {
    let seed = match &config.seed_path {
        Some(seed_path) => match load_seed(seed_path) {
            Ok(seed) => Some(seed),
            Err(e) => {
                error!("Failed to read seed file {}: {}", seed_path.display(), e);
                return Err(rocket);
            }
        },
        None => None,
    };

    let store = match FileStore::open(&config.db_path, seed) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open ledger {}: {}", config.db_path.display(), e);
            return Err(rocket);
        }
    };

    let service: SharedService = Arc::new(BallotService::new(Arc::new(store), config.election));
    Ok(rocket.manage(service))
}

pub fn stage(config: Config) -> AdHoc {
    AdHoc::on_ignite("Ledger Stage", move |rocket| async move {
        rocket
            .attach(AdHoc::try_on_ignite("Ledger Store", move |rocket| {
                init_store(rocket, config)
            }))
            .attach(AdHoc::on_shutdown("Ledger Flush", |rocket| {
                Box::pin(async move {
                    if let Some(service) = rocket.state::<SharedService>() {
                        let store = service.store();
                        match store.flush() {
                            Ok(()) => info!("ledger flushed to {}", store.path().display()),
                            Err(e) => error!("Failed to flush ledger: {}", e),
                        }
                    }
                })
            }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seed() -> LedgerSnapshot {
        let store = MemStore::new();
        store.insert_voter(Voter::new("CSE2024001", "TOKEN_ALPHA_123"));
        store.insert_candidate(Candidate::new(1, "Ivanvo"));
        store.snapshot()
    }

    fn commit(voter: &Voter, proof: &str) -> CastCommit {
        let timestamp = Utc::now();
        let proof_id = issue_proof(proof, &iso_timestamp(&timestamp), "00", None, None);
        CastCommit {
            voter_id: voter.id.clone(),
            expected_version: voter.version,
            ballot: BallotRecord {
                candidate_id: 1,
                timestamp,
                proof_id: proof_id.clone(),
            },
            audit: AuditRecord {
                proof_id,
                timestamp,
                action_type: ActionType::VoteCast,
                wallet_address: None,
            },
        }
    }

    #[test]
    fn ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let store = FileStore::open(&path, Some(seed())).unwrap();
            let voter = store.voter("CSE2024001").unwrap();
            let outcome = store.commit_cast(commit(&voter, "ctx")).unwrap();
            assert_eq!(outcome, CommitOutcome::Committed);
        }

        // The seed only applies to a fresh ledger
        let store = FileStore::open(&path, Some(seed())).unwrap();
        assert!(store.voter("CSE2024001").unwrap().used);
        assert_eq!(store.candidate(1).unwrap().votes, 1);
        assert_eq!(store.list_audit().unwrap().len(), 1);
        assert_eq!(store.list_ballots().unwrap().len(), 1);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_write_leaves_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = FileStore::open(&path, Some(seed())).unwrap();
        let on_disk = fs::read(&path).unwrap();

        // A directory where the temp file should go makes every write fail
        fs::create_dir(temp_path(&path)).unwrap();

        let voter = store.voter("CSE2024001").unwrap();
        assert!(matches!(
            store.commit_cast(commit(&voter, "ctx")),
            Err(StoreError::Io(_))
        ));

        assert!(!store.voter("CSE2024001").unwrap().used);
        assert_eq!(store.candidate(1).unwrap().votes, 0);
        assert!(store.list_audit().unwrap().is_empty());
        assert_eq!(fs::read(&path).unwrap(), on_disk);

        // Once the disk recovers the same commit goes through
        fs::remove_dir(temp_path(&path)).unwrap();
        assert_eq!(
            store.commit_cast(commit(&voter, "ctx")).unwrap(),
            CommitOutcome::Committed
        );
    }

    #[test]
    fn lost_race_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = FileStore::open(&path, Some(seed())).unwrap();

        let voter = store.voter("CSE2024001").unwrap();
        assert!(store
            .compare_and_swap_voter(&voter.id, voter.version, voter.clone())
            .unwrap());

        fs::create_dir(temp_path(&path)).unwrap();
        assert!(!store
            .compare_and_swap_voter(&voter.id, voter.version, voter.clone())
            .unwrap());
    }

    #[test]
    fn example_seed_loads() {
        let raw = include_str!("../seed.example.json");
        let seed: LedgerSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(seed.voters.len(), 10);
        assert_eq!(seed.candidates.len(), 3);
        assert_eq!(seed.candidates[2].metadata["department"], "MECH");

        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("ledger.json"), Some(seed)).unwrap();
        assert_eq!(store.voter("CSE2024010").unwrap().state(), VoterState::Unverified);
    }

    #[test]
    fn snapshot_directory_is_synced() {
        assert_eq!(parent_dir(Path::new("ballotproof.json")), Path::new("."));
        assert_eq!(parent_dir(Path::new("data/ledger.json")), Path::new("data"));

        let dir = tempfile::tempdir().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(matches!(
            sync_dir(&dir.path().join("missing")),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            FileStore::open(&path, None),
            Err(StoreError::Serialization(_))
        ));
    }
}
