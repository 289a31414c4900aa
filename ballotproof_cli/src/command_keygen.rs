pub fn command_keygen() -> anyhow::Result<()> {
    let (secret, address) = ballotproof::generate_wallet();

    println!("secret-key: {}", hex::encode(secret.to_bytes()));
    println!("address: {}", address);

    Ok(())
}
