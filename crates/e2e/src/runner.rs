//! Run orchestration: optional server launch, session lifecycle, the
//! scenario itself, and the JSON report

use std::path::PathBuf;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::error::{WorkflowError, WorkflowResult};
use crate::server::ServerHandle;
use crate::session::Session;
use crate::workflow::{self, StepOutcome};

/// Result of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepOutcome>,
    pub article_title: Option<String>,
    pub error: Option<String>,
}

/// Drives one workflow run end to end
pub struct Runner {
    config: Config,
    output_dir: PathBuf,
    server: Option<ServerHandle>,
}

impl Runner {
    pub fn new(config: Config, output_dir: PathBuf) -> Self {
        Self {
            config,
            output_dir,
            server: None,
        }
    }

    /// Launch the application server when the configuration asks for one;
    /// otherwise an already running instance is assumed.
    pub async fn start_server(&mut self) -> WorkflowResult<()> {
        if self.server.is_some() {
            return Ok(());
        }
        if let Some(server_config) = &self.config.server {
            let handle = ServerHandle::spawn(
                server_config,
                &self.config.base_url,
                self.config.startup_timeout(),
            )
            .await?;
            self.server = Some(handle);
        }
        Ok(())
    }

    pub fn stop_server(&mut self) -> WorkflowResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run the scenario once. The session is released on every exit path
    /// before the outcome is interpreted.
    pub async fn run(&mut self) -> WorkflowResult<WorkflowReport> {
        let name = "admin-article-workflow";
        let start = Instant::now();

        self.start_server().await?;

        let session = Session::open(&self.config).await?;
        let mut steps = Vec::new();
        let outcome = workflow::run(&session, &mut steps).await;
        let close_result = session.close().await;

        let article_title = outcome.as_ref().ok().map(|draft| draft.title.clone());
        let first_failure: Option<WorkflowError> = match outcome {
            Err(e) => Some(e),
            Ok(_) => close_result.err(),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let report = WorkflowReport {
            name: name.to_string(),
            success: first_failure.is_none(),
            duration_ms,
            steps,
            article_title,
            error: first_failure.map(|e| e.to_string()),
        };

        if report.success {
            info!("✓ {} ({} ms)", report.name, report.duration_ms);
        } else {
            error!(
                "✗ {} - {}",
                report.name,
                report.error.as_deref().unwrap_or("unknown error")
            );
        }

        Ok(report)
    }

    /// Write the report as JSON
    pub fn write_report(&self, report: &WorkflowReport) -> WorkflowResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("workflow-report.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_round_trip() {
        let report = WorkflowReport {
            name: "admin-article-workflow".to_string(),
            success: false,
            duration_ms: 1234,
            steps: vec![StepOutcome {
                name: "log in as administrator".to_string(),
                duration_ms: 400,
            }],
            article_title: None,
            error: Some("Assertion timed out".to_string()),
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: WorkflowReport = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.steps[0].name, "log in as administrator");
    }
}
