use pagetap_store::EventStore;
use std::path::PathBuf;

pub async fn run(log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let store = EventStore::open(super::resolve_log_file(log_file));
    store.clear_logs()?;
    println!("Logs cleared");
    Ok(())
}
