use anyhow::Context;
use pagetap_render::Renderer;
use pagetap_store::EventStore;
use std::path::PathBuf;

pub async fn run(
    format: &str,
    output: Option<PathBuf>,
    log_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = EventStore::open(super::resolve_log_file(log_file));
    let logs = store.current_logs();
    let rendered = Renderer::from_name(format).format(&logs);

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("failed to save to {}", path.display()))?;
            println!("Logs saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
