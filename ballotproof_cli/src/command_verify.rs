use crate::arg;

pub fn command_verify(matches: &clap::ArgMatches, uri: &str) -> anyhow::Result<()> {
    let proof_id = arg(matches, "PROOF-ID")?;
    let verified = crate::rest::verify_proof(uri, proof_id)?;

    if !verified.valid {
        anyhow::bail!(
            "{}",
            verified
                .message
                .unwrap_or_else(|| "Invalid or non-existent Proof ID.".to_owned())
        );
    }

    println!("valid: true");
    if let Some(timestamp) = verified.timestamp {
        println!("timestamp: {}", timestamp);
    }
    if let Some(action_type) = verified.action_type {
        println!("action: {}", action_type);
    }
    if let Some(address) = verified.wallet_address {
        println!("wallet: {}", address);
    }

    Ok(())
}
