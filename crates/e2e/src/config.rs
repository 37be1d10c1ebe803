//! Run configuration
//!
//! Everything the engine needs is threaded in explicitly through this object:
//! target origin, administrator credentials, timeouts, viewport. No globals.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::WorkflowResult;
use crate::server::ServerConfig;

/// Configuration for one workflow run, loadable from YAML or built from
/// CLI flags by the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base origin of the application under test
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Administrator credentials used by the login step
    #[serde(default)]
    pub credentials: Credentials,

    /// Run the browser headless
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Timeout for a navigation to reach network-idle
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Timeout for a single assertion to hold
    #[serde(default = "default_assertion_timeout_ms")]
    pub assertion_timeout_ms: u64,

    /// Interval between assertion attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for the target origin to become reachable at startup
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Launch the application server on demand; when absent an already
    /// running instance at `base_url` is expected
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

fn default_navigation_timeout_ms() -> u64 {
    15_000
}

fn default_assertion_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_startup_timeout_ms() -> u64 {
    30_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            credentials: Credentials::default(),
            headless: default_headless(),
            viewport: default_viewport(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            assertion_timeout_ms: default_assertion_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            server: None,
        }
    }
}

impl Config {
    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> WorkflowResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a configuration from a YAML file
    pub fn from_file(path: &Path) -> WorkflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn assertion_timeout(&self) -> Duration {
        Duration::from_millis(self.assertion_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.credentials.username, "admin");
        assert_eq!(config.assertion_timeout(), Duration::from_secs(5));
        assert!(config.navigation_timeout() > config.assertion_timeout());
        assert!(config.server.is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
base_url: http://127.0.0.1:9000
credentials:
  username: editor
  password: secret
navigation_timeout_ms: 60000
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.credentials.username, "editor");
        assert_eq!(config.navigation_timeout_ms, 60_000);
        // Unspecified fields fall back to defaults
        assert_eq!(config.assertion_timeout_ms, 5_000);
        assert!(config.headless);
    }

    #[test]
    fn test_parse_with_server_launch() {
        let yaml = r#"
base_url: http://localhost:8080
server:
  command: ./mvnw
  args: ["spring-boot:run"]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let server = config.server.expect("server section");
        assert_eq!(server.command, "./mvnw");
        assert_eq!(server.args, vec!["spring-boot:run"]);
    }
}
