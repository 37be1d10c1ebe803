//! Target application management - spawning and readiness-checking the app
//! under test when it is not already running

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{WorkflowError, WorkflowResult};

/// Handle to a running application server process
pub struct ServerHandle {
    child: Child,
    base_url: String,
}

impl ServerHandle {
    /// Spawn the application server and wait for it to answer HTTP requests
    pub async fn spawn(
        config: &ServerConfig,
        base_url: &str,
        startup_timeout: Duration,
    ) -> WorkflowResult<Self> {
        info!("Spawning application server: {}", config.command);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        if let Some(workdir) = &config.workdir {
            cmd.current_dir(workdir);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            WorkflowError::ServerStartup(format!("failed to spawn {}: {}", config.command, e))
        })?;

        let handle = ServerHandle {
            child,
            base_url: base_url.to_string(),
        };

        handle.wait_for_ready(&config.ready_path, startup_timeout).await?;

        info!("Application server is ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the readiness path until the server answers
    async fn wait_for_ready(&self, ready_path: &str, timeout: Duration) -> WorkflowResult<()> {
        let ready_url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            ready_path.trim_start_matches('/')
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&ready_url).send().await {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Readiness check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application server to start...");
                    }
                    // Connection refused is expected while the server boots
                    if !e.is_connect() {
                        warn!("Readiness check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(500)).await;
        }

        Err(WorkflowError::ServerReadiness(attempts))
    }

    /// Stop the server
    pub fn stop(&mut self) -> WorkflowResult<()> {
        info!("Stopping application server (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// How to launch the application under test on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Command to run (e.g. `./mvnw`)
    pub command: String,

    /// Arguments for the command (e.g. `spring-boot:run`)
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the command
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Path polled for readiness, relative to the base origin
    #[serde(default = "default_ready_path")]
    pub ready_path: String,

    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_ready_path() -> String {
    "/login".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
command: ./mvnw
args: ["spring-boot:run"]
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.command, "./mvnw");
        assert_eq!(config.ready_path, "/login");
        assert!(config.env.is_empty());
        assert!(config.workdir.is_none());
    }
}
