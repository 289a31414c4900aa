use clap::{App, AppSettings, Arg, SubCommand};
use k256::ecdsa::SigningKey;
use num_enum::TryFromPrimitive;
use std::path::Path;

mod command_audit;
mod command_bind;
mod command_identity;
mod command_keygen;
mod command_results;
mod command_status;
mod command_verify;
mod command_vote;
mod rest;

use command_audit::command_audit;
use command_bind::command_bind;
use command_identity::command_identity;
use command_keygen::command_keygen;
use command_results::command_results;
use command_status::command_status;
use command_verify::command_verify;
use command_vote::command_vote;

#[derive(TryFromPrimitive, PartialEq, PartialOrd, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Verbosity {
    Silent = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
}

fn main() {
    let matches = App::new("BallotProof CLI")
        .version("0.1")
        .about("Casts ballots against a ballotproofd server and checks proof receipts")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("uri")
                .help("Set the ballotproofd uri - can also be set with BALLOTPROOF_URI")
                .required(false),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Suppress error output"),
        )
        .arg(
            Arg::with_name("key")
                .long("key")
                .takes_value(true)
                .help(
                    "Wallet secret key as hex, or a file holding it - \
                     can also be set with BALLOTPROOF_WALLET_KEY",
                ),
        )
        .subcommand(SubCommand::with_name("keygen").about("Generate a wallet key"))
        .subcommand(SubCommand::with_name("status").about("Show the election phase and window"))
        .subcommand(
            SubCommand::with_name("identity")
                .about("Check a voter's eligibility and wallet binding")
                .arg(Arg::with_name("VOTER-ID").index(1).required(true))
                .arg(Arg::with_name("TOKEN").index(2).required(true)),
        )
        .subcommand(
            SubCommand::with_name("bind")
                .about("Bind the wallet key to a voter")
                .arg(Arg::with_name("VOTER-ID").index(1).required(true))
                .arg(Arg::with_name("TOKEN").index(2).required(true)),
        )
        .subcommand(
            SubCommand::with_name("vote")
                .about("Cast a ballot signed with the wallet key")
                .arg(Arg::with_name("VOTER-ID").index(1).required(true))
                .arg(Arg::with_name("TOKEN").index(2).required(true))
                .arg(Arg::with_name("CANDIDATE-ID").index(3).required(true)),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("Verify a proof receipt")
                .arg(Arg::with_name("PROOF-ID").index(1).required(true)),
        )
        .subcommand(SubCommand::with_name("results").about("Show candidates and their counts"))
        .subcommand(
            SubCommand::with_name("audit")
                .about("Export the audit log")
                .arg(
                    Arg::with_name("check")
                        .long("check")
                        .takes_value(true)
                        .value_name("PROOF-ID")
                        .help("Cross-check a proof against the exported log"),
                ),
        )
        .get_matches();

    let verbosity = match matches.occurrences_of("v") {
        _ if matches.is_present("quiet") => Verbosity::Silent,
        0 => Verbosity::Warn,
        n => Verbosity::try_from_primitive((n + 2).min(3) as u8).unwrap_or(Verbosity::Info),
    };

    let env_var = std::env::var("BALLOTPROOF_URI");
    let uri = match matches.value_of("uri") {
        Some(uri) => uri,
        None => env_var.as_deref().unwrap_or("http://localhost:8000"),
    };
    let uri = uri.trim_end_matches('/');
    if verbosity >= Verbosity::Info {
        println!("URI: {}", uri);
    }

    let env_key = std::env::var("BALLOTPROOF_WALLET_KEY").ok();
    let key_arg = matches.value_of("key").or_else(|| env_key.as_deref());

    let result = match matches.subcommand() {
        ("keygen", Some(_)) => command_keygen(),
        ("status", Some(_)) => command_status(uri),
        ("identity", Some(matches)) => command_identity(matches, uri),
        ("bind", Some(matches)) => require_key(key_arg)
            .and_then(|key| command_bind(matches, uri, &key, verbosity)),
        ("vote", Some(matches)) => require_key(key_arg)
            .and_then(|key| command_vote(matches, uri, &key, verbosity)),
        ("verify", Some(matches)) => command_verify(matches, uri),
        ("results", Some(_)) => command_results(uri),
        ("audit", Some(matches)) => command_audit(matches, uri, verbosity),
        _ => Ok(()),
    };

    if let Err(e) = result {
        if verbosity >= Verbosity::Error {
            eprintln!("ballotproof: {}", e);
        }
        std::process::exit(1);
    }
}

/// Expand `~` and environment variables in a user-supplied path or value
pub fn expand(input: &str) -> String {
    match shellexpand::full(input) {
        Ok(expanded) => expanded.into_owned(),
        Err(_) => input.to_owned(),
    }
}

fn require_key(key_arg: Option<&str>) -> anyhow::Result<SigningKey> {
    match key_arg {
        Some(value) => load_key(value),
        None => anyhow::bail!(
            "please provide a wallet key either via --key or BALLOTPROOF_WALLET_KEY \
             (see `ballotproof keygen`)"
        ),
    }
}

/// Read a wallet key given as hex or as the path of a file holding the hex
pub fn load_key(value: &str) -> anyhow::Result<SigningKey> {
    let expanded = expand(value);
    let raw = if Path::new(&expanded).is_file() {
        std::fs::read_to_string(&expanded)?
    } else {
        expanded
    };

    let raw = raw.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes =
        hex::decode(raw).map_err(|e| anyhow::anyhow!("wallet key is not valid hex: {}", e))?;
    SigningKey::from_slice(&bytes)
        .map_err(|_| anyhow::anyhow!("wallet key is not a valid secp256k1 secret key"))
}

/// Parse a required positional argument
pub fn arg<'a>(matches: &'a clap::ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| anyhow::anyhow!("{} is required", name))
}
