pub fn command_results(uri: &str) -> anyhow::Result<()> {
    let candidates = crate::rest::get_candidates(uri)?;

    for candidate in candidates {
        let name = candidate
            .metadata
            .get("name")
            .and_then(|name| name.as_str())
            .unwrap_or("");
        println!("{:>4}  {:<24} {}", candidate.id, name, candidate.votes);
    }

    Ok(())
}
