use crate::*;
use digest::Digest;
use sha2::Sha256;
use std::sync::Arc;

/// Derive a proof id: SHA-256 over the context id, timestamp, nonce and,
/// when present, the signing address and signature.
///
/// Voter identity and candidate choice are never part of the input. The
/// caller supplies a fresh random nonce for every real cast.
pub fn issue_proof(
    context_id: &str,
    timestamp: &str,
    nonce: &str,
    address: Option<&Address>,
    signature: Option<&str>,
) -> ProofId {
    let mut hasher = Sha256::new();
    hasher.update(context_id.as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(nonce.as_bytes());
    if let (Some(address), Some(signature)) = (address, signature) {
        hasher.update(address.to_string().as_bytes());
        hasher.update(signature.as_bytes());
    }
    ProofId::from_digest(&hasher.finalize())
}

/// Appends receipts and answers verification queries against the audit log
pub struct ProofLedger<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> ProofLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        ProofLedger { store }
    }

    /// Append a record; never overwrites an existing proof
    pub fn append(&self, record: AuditRecord) -> Result<(), Error> {
        Ok(self.store.append_audit(record)?)
    }

    /// The audit record for `proof_id`, or `ProofNotFound`
    pub fn lookup(&self, proof_id: &str) -> Result<AuditRecord, Error> {
        self.store
            .find_audit_by_proof(proof_id.trim())?
            .ok_or_else(|| Error::ProofNotFound(proof_id.to_owned()))
    }

    /// The full audit log, in append order
    pub fn list_all(&self) -> Result<Vec<AuditRecord>, Error> {
        Ok(self.store.list_audit()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str = "0d4f7f0e-4c0e-4c55-9d4f-3c3f7f2a9b11";
    const TIMESTAMP: &str = "2026-02-13T10:30:00.000Z";
    const NONCE: &str = "00112233445566778899aabbccddeeff";

    #[test]
    fn issue_proof_is_deterministic() {
        let a = issue_proof(CONTEXT, TIMESTAMP, NONCE, None, None);
        let b = issue_proof(CONTEXT, TIMESTAMP, NONCE, None, None);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn every_input_changes_the_proof() {
        let address: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let base = issue_proof(CONTEXT, TIMESTAMP, NONCE, None, None);

        let proofs = vec![
            issue_proof("other", TIMESTAMP, NONCE, None, None),
            issue_proof(CONTEXT, "2026-02-13T10:30:00.001Z", NONCE, None, None),
            issue_proof(CONTEXT, TIMESTAMP, &generate_nonce(), None, None),
            issue_proof(CONTEXT, TIMESTAMP, NONCE, Some(&address), Some("0x01")),
        ];
        for proof in proofs {
            assert_ne!(proof, base);
        }
    }

    #[test]
    fn lookup_and_list() {
        let ledger = ProofLedger::new(Arc::new(MemStore::new()));
        let proof_id = issue_proof(CONTEXT, TIMESTAMP, NONCE, None, None);
        let record = AuditRecord {
            proof_id: proof_id.clone(),
            timestamp: parse_iso_timestamp(TIMESTAMP).unwrap(),
            action_type: ActionType::VoteCast,
            wallet_address: None,
        };

        assert!(matches!(
            ledger.lookup(proof_id.as_str()),
            Err(Error::ProofNotFound(_))
        ));

        ledger.append(record.clone()).unwrap();
        assert_eq!(ledger.lookup(proof_id.as_str()).unwrap(), record);
        assert!(ledger.append(record.clone()).is_err());
        assert_eq!(ledger.list_all().unwrap(), vec![record]);

        assert!(matches!(
            ledger.lookup("never-issued"),
            Err(Error::ProofNotFound(_))
        ));
    }
}
