use crate::{arg, Verbosity};
use ballotproof::{generate_nonce, sign_message, Address, BindWalletRequest, Intent};
use chrono::Utc;
use k256::ecdsa::SigningKey;

pub fn command_bind(
    matches: &clap::ArgMatches,
    uri: &str,
    key: &SigningKey,
    verbosity: Verbosity,
) -> anyhow::Result<()> {
    let voter_id = arg(matches, "VOTER-ID")?;
    let address = Address::from_verifying_key(key.verifying_key());

    let message = Intent::bind_wallet(voter_id, Utc::now(), &generate_nonce()).to_string();
    if verbosity >= Verbosity::Info {
        println!("signing:\n{}", message);
    }

    let request = BindWalletRequest {
        voter_id: voter_id.to_owned(),
        token: arg(matches, "TOKEN")?.to_owned(),
        wallet_address: address.to_string(),
        signature: sign_message(key, &message)?,
        message,
    };
    crate::rest::bind_wallet(uri, &request)?;

    println!("wallet {} bound to voter {}", address, voter_id);
    Ok(())
}
