use crate::Verbosity;
use ballotproof::{iso_timestamp, AuditRecord, VerifyProofResponse};

pub fn command_audit(
    matches: &clap::ArgMatches,
    uri: &str,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let log = crate::rest::get_audit_log(uri)?;

    let proof_id = match matches.value_of("check") {
        Some(proof_id) => proof_id.trim(),
        None => {
            println!("{}", serde_json::to_string_pretty(&log)?);
            return Ok(());
        }
    };

    let verified = crate::rest::verify_proof(uri, proof_id)?;
    let exported = log.iter().find(|record| record.proof_id.as_str() == proof_id);
    if verbosity >= Verbosity::Info {
        println!("audit log holds {} records", log.len());
    }

    cross_check(proof_id, &verified, exported)?;
    println!("proof {} is recorded and matches the exported audit log", proof_id);
    Ok(())
}

/// The verification endpoint and the exported log must agree on a proof
fn cross_check(
    proof_id: &str,
    verified: &VerifyProofResponse,
    exported: Option<&AuditRecord>,
) -> anyhow::Result<()> {
    match (verified.valid, exported) {
        (false, None) => anyhow::bail!("proof {} is not in the ledger", proof_id),
        (true, None) => {
            anyhow::bail!("proof {} verifies but is missing from the exported log", proof_id)
        }
        (false, Some(_)) => {
            anyhow::bail!("proof {} is in the exported log but does not verify", proof_id)
        }
        (true, Some(record)) => {
            if verified.timestamp.as_deref() != Some(iso_timestamp(&record.timestamp).as_str())
                || verified.action_type != Some(record.action_type)
                || verified.wallet_address != record.wallet_address
            {
                anyhow::bail!(
                    "proof {} differs between verification and the exported log",
                    proof_id
                );
            }
            Ok(())
        }
    }
}
