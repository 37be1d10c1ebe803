//! Error types for workflow verification

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server readiness check failed after {0} attempts")]
    ServerReadiness(usize),

    #[error("No element matched locator: {locator}")]
    ElementNotFound { locator: String },

    #[error("Locator matched {count} elements, expected exactly one: {locator}")]
    AmbiguousElement { locator: String, count: usize },

    #[error("Navigation did not settle within {elapsed_ms} ms (last url: {last_url})")]
    NavigationTimeout { elapsed_ms: u64, last_url: String },

    #[error("Assertion timed out after {elapsed_ms} ms: {locator} {predicate} (last observed: {observed})")]
    AssertionTimeout {
        locator: String,
        predicate: String,
        observed: String,
        elapsed_ms: u64,
    },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL pattern: {0}")]
    UrlPattern(#[from] regex::Error),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
