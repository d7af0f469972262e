use pagetap_store::EventStore;
use std::path::PathBuf;

pub async fn run(agent: &str, log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let store = EventStore::open(super::resolve_log_file(log_file));
    let logs = store.current_logs();
    let info = pagetap_render::agent_info(&logs, agent);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
