use crate::arg;
use ballotproof::VerifyIdentityRequest;

pub fn command_identity(matches: &clap::ArgMatches, uri: &str) -> anyhow::Result<()> {
    let request = VerifyIdentityRequest {
        voter_id: arg(matches, "VOTER-ID")?.to_owned(),
        token: arg(matches, "TOKEN")?.to_owned(),
    };
    let identity = crate::rest::verify_identity(uri, &request)?;

    println!("eligible: {}", identity.eligible);
    match identity.address {
        Some(address) => println!("wallet: {}", address),
        None => println!("wallet: not bound"),
    }

    Ok(())
}
