use pagetap_core::Paths;
use pagetap_server::discovery;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    match discovery::server_info(&paths) {
        Some(info) => {
            println!("pagetap server is running");
            println!("  Address: {}:{}", info.host, info.port);
            println!("  Pid:     {}", info.pid);
            let started = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(info.start_time)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| info.start_time.to_string());
            println!("  Started: {}", started);
        }
        None => {
            println!("No running pagetap server found.");
            println!("Run `pagetap start` to launch one.");
        }
    }

    Ok(())
}
