use pagetap_core::{Paths, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ports probed by clients when no discovery record exists.
pub const DISCOVERY_PORTS: [u16; 7] = [8090, 8080, 3000, 3001, 3030, 5000, 8000];

/// Discovery record for the currently running ingest endpoint, written to
/// the per-user config directory on start and removed on clean stop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub port: u16,
    pub host: String,
    pub pid: u32,
    pub start_time: i64,
}

pub fn register_server(paths: &Paths, info: &ServerInfo) -> Result<()> {
    paths.ensure_dirs()?;
    std::fs::write(
        paths.server_info_file(),
        serde_json::to_string_pretty(info)?,
    )?;
    Ok(())
}

pub fn unregister_server(paths: &Paths) -> Result<()> {
    let path = paths.server_info_file();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Current registration, if the recorded process is still alive. A stale
/// record (dead pid) is deleted on the way out.
pub fn server_info(paths: &Paths) -> Option<ServerInfo> {
    let path = paths.server_info_file();
    let info: ServerInfo = std::fs::read_to_string(&path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())?;

    if process_alive(info.pid) {
        Some(info)
    } else {
        debug!(pid = info.pid, "removing stale discovery record");
        let _ = std::fs::remove_file(&path);
        None
    }
}

/// Candidate endpoint URLs: the registered server first, then the common
/// development ports, deduplicated.
pub fn discovery_urls(paths: &Paths) -> Vec<String> {
    let mut urls = Vec::new();

    if let Some(info) = server_info(paths) {
        if info.host == "0.0.0.0" {
            urls.push(format!("http://localhost:{}", info.port));
            urls.push(format!("http://127.0.0.1:{}", info.port));
        } else {
            urls.push(format!("http://{}:{}", info.host, info.port));
        }
    }

    for port in DISCOVERY_PORTS {
        urls.push(format!("http://localhost:{}", port));
    }

    let mut seen = std::collections::HashSet::new();
    urls.retain(|u| seen.insert(u.clone()));
    urls
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 probes existence without delivering anything.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
