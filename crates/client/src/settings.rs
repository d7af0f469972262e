use notify::{RecursiveMode, Watcher};
use pagetap_core::{Error, Result};
use std::path::Path;
use tokio::sync::mpsc;

/// Keeps the underlying filesystem watcher alive for the session's lifetime.
pub struct SettingsWatcher {
    _watcher: notify::RecommendedWatcher,
}

/// Watches the client settings file and signals each change on the returned
/// channel. Bursts coalesce into a single pending signal; the session
/// reloads once per signal.
pub fn watch_settings(path: &Path) -> Result<(SettingsWatcher, mpsc::Receiver<()>)> {
    let (tx, rx) = mpsc::channel(1);
    let file_name = path.file_name().map(|n| n.to_os_string());

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        ) {
            return;
        }
        let relevant = match &file_name {
            Some(name) => event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(name.as_os_str())),
            None => true,
        };
        if relevant {
            let _ = tx.try_send(());
        }
    })
    .map_err(|e| Error::Config(format!("failed to create settings watcher: {}", e)))?;

    // Watch the parent directory so a settings file created later is seen.
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Config(format!("failed to watch {}: {}", dir.display(), e)))?;

    Ok((SettingsWatcher { _watcher: watcher }, rx))
}
