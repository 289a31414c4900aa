use crate::{arg, Verbosity};
use ballotproof::{generate_nonce, sign_message, Address, CastVoteRequest, Intent};
use chrono::Utc;
use k256::ecdsa::SigningKey;

pub fn command_vote(
    matches: &clap::ArgMatches,
    uri: &str,
    key: &SigningKey,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let voter_id = arg(matches, "VOTER-ID")?;
    let candidate_id: u32 = arg(matches, "CANDIDATE-ID")?
        .parse()
        .map_err(|_| anyhow::anyhow!("CANDIDATE-ID must be a number"))?;
    let address = Address::from_verifying_key(key.verifying_key());

    let message =
        Intent::cast_vote(voter_id, candidate_id, Utc::now(), &generate_nonce()).to_string();
    if verbosity >= Verbosity::Info {
        println!("signing:\n{}", message);
    }

    let request = CastVoteRequest {
        voter_id: voter_id.to_owned(),
        token: arg(matches, "TOKEN")?.to_owned(),
        candidate_id: Some(candidate_id),
        wallet_address: address.to_string(),
        signature: sign_message(key, &message)?,
        message,
    };
    let receipt = crate::rest::cast_vote(uri, &request)?;

    println!("proof-id: {}", receipt.proof_id);
    if verbosity >= Verbosity::Warn {
        eprintln!("Keep this proof id: it is the only way to check your ballot was recorded");
    }
    Ok(())
}
