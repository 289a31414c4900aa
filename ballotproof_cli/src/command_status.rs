use ballotproof::iso_timestamp;

pub fn command_status(uri: &str) -> anyhow::Result<()> {
    let status = crate::rest::get_status(uri)?;

    println!("phase: {}", status.phase);
    println!("start: {}", iso_timestamp(&status.start_time));
    println!("end:   {}", iso_timestamp(&status.end_time));
    if status.demo_mode {
        println!("demo mode: the election is held open regardless of the window");
    }

    Ok(())
}
