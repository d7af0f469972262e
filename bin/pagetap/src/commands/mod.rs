pub mod agent_info;
pub mod capture;
pub mod clear;
pub mod relay;
pub mod start;
pub mod status;

use pagetap_core::{config, Paths};
use std::path::PathBuf;

/// Explicit flag, then the environment override, then the per-directory
/// default.
pub(crate) fn resolve_log_file(log_file: Option<PathBuf>) -> PathBuf {
    log_file
        .or_else(|| std::env::var(config::ENV_LOG_FILE).ok().map(PathBuf::from))
        .unwrap_or_else(Paths::default_log_file)
}
