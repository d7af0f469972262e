use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".pagetap"))
            .unwrap_or_else(|| PathBuf::from(".pagetap"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    /// Discovery record for the currently running ingest endpoint.
    pub fn server_info_file(&self) -> PathBuf {
        self.base.join("server.json")
    }

    /// Transport-client settings.
    pub fn client_settings_file(&self) -> PathBuf {
        self.base.join("client.json")
    }

    /// Default event-log location: one document per working directory.
    pub fn default_log_file() -> PathBuf {
        PathBuf::from(".pagetap-logs.json")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
