use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment overrides honored by the CLI and the ingest endpoint.
pub const ENV_LOG_FILE: &str = "PAGETAP_LOG_FILE";
pub const ENV_CORS_ORIGIN: &str = "PAGETAP_ORIGIN";
pub const ENV_AUTH_TOKEN: &str = "PAGETAP_TOKEN";

/// Options for one ingest-endpoint invocation. Assembled from CLI flags with
/// environment fallbacks; there is no server-side config file.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    pub host: String,
    pub format: String,
    pub output_file: Option<PathBuf>,
    pub watch: bool,
    pub log_file: Option<PathBuf>,
    pub cors_origin: Option<String>,
    pub auth_token: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: 8090,
            host: "127.0.0.1".to_string(),
            format: "json".to_string(),
            output_file: None,
            watch: false,
            log_file: None,
            cors_origin: None,
            auth_token: None,
        }
    }
}

impl ServerOptions {
    /// Fill unset options from the environment.
    pub fn with_env_fallbacks(mut self) -> Self {
        if self.log_file.is_none() {
            self.log_file = std::env::var(ENV_LOG_FILE).ok().map(PathBuf::from);
        }
        if self.cors_origin.is_none() {
            self.cors_origin = non_empty(std::env::var(ENV_CORS_ORIGIN).ok());
        }
        if self.auth_token.is_none() {
            self.auth_token = non_empty(std::env::var(ENV_AUTH_TOKEN).ok());
        }
        self
    }

    pub fn log_file_or_default(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(crate::paths::Paths::default_log_file)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Transport-client settings, persisted at `~/.pagetap/client.json`.
/// Reloaded whenever the settings watcher signals a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_server_url() -> String {
    "ws://localhost:8090".to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auth_token: None,
        }
    }
}

impl ClientSettings {
    /// Missing or unparseable settings fall back to defaults; the relay keeps
    /// running against localhost rather than failing the host process.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The persistent-channel endpoint, normalized to a ws/wss scheme.
    pub fn ws_url(&self) -> String {
        if let Some(rest) = self.server_url.strip_prefix("https:") {
            format!("wss:{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("http:") {
            format!("ws:{}", rest)
        } else {
            self.server_url.clone()
        }
    }

    /// Base URL for the request/response fallback path.
    pub fn http_base(&self) -> String {
        if let Some(rest) = self.server_url.strip_prefix("wss:") {
            format!("https:{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("ws:") {
            format!("http:{}", rest)
        } else {
            self.server_url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_settings_defaults_on_missing() {
        let settings = ClientSettings::load(Path::new("/nonexistent/client.json"));
        assert_eq!(settings.server_url, "ws://localhost:8090");
        assert!(settings.auth_token.is_none());
    }

    #[test]
    fn test_url_scheme_mapping() {
        let settings = ClientSettings {
            server_url: "http://localhost:8090".to_string(),
            auth_token: None,
        };
        assert_eq!(settings.ws_url(), "ws://localhost:8090");

        let settings = ClientSettings {
            server_url: "ws://localhost:8090".to_string(),
            auth_token: None,
        };
        assert_eq!(settings.http_base(), "http://localhost:8090");

        let settings = ClientSettings {
            server_url: "wss://dev.example:8443".to_string(),
            auth_token: None,
        };
        assert_eq!(settings.http_base(), "https://dev.example:8443");
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        let settings = ClientSettings {
            server_url: "ws://127.0.0.1:9000".to_string(),
            auth_token: Some("abc".to_string()),
        };
        settings.save(&path).unwrap();
        assert_eq!(ClientSettings::load(&path), settings);
    }
}
