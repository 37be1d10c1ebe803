//! Polling assertion engine
//!
//! Rendering is asynchronous relative to the action that triggered it, so
//! every assertion re-resolves its locator at a fixed interval until the
//! predicate holds or the assertion timeout (shorter than the navigation
//! timeout) elapses. Failures carry the descriptor, the predicate, the last
//! observed value and the elapsed wait. A dead session aborts immediately
//! instead of exhausting the poll budget.
//!
//! When a locator matches several elements the first match is asserted on;
//! scenario locators narrow with `first()`/`nth()` where order matters.

use std::fmt;
use std::time::{Duration, Instant};

use chromiumoxide::element::Element;
use regex::Regex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{WorkflowError, WorkflowResult};
use crate::locator::{rendered_text, Locator};
use crate::session::{session_fault, Session};

/// What an assertion demands of its target.
#[derive(Debug, Clone)]
enum Predicate {
    Visible,
    HasText(String),
    ContainsText(String),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Visible => write!(f, "to be visible"),
            Predicate::HasText(text) => write!(f, "to have text \"{}\"", text),
            Predicate::ContainsText(text) => write!(f, "to contain \"{}\"", text),
        }
    }
}

/// One poll attempt: the predicate held, or what was seen instead.
enum Observation {
    Pass,
    Fail(String),
}

/// A pending assertion built by [`Session::expect`].
pub struct Expect<'a> {
    session: &'a Session,
    locator: Locator,
    timeout: Duration,
    interval: Duration,
}

impl Session {
    /// Begin an assertion against the element(s) described by `locator`.
    pub fn expect(&self, locator: Locator) -> Expect<'_> {
        Expect {
            session: self,
            locator,
            timeout: self.config().assertion_timeout(),
            interval: self.config().poll_interval(),
        }
    }

    /// Poll the page URL until it matches the pattern.
    pub async fn expect_url(&self, pattern: &str) -> WorkflowResult<()> {
        let regex = Regex::new(pattern)?;
        let timeout = self.config().assertion_timeout();
        let interval = self.config().poll_interval();
        let start = Instant::now();
        let mut observed;

        loop {
            let url = self.current_url().await?;
            if regex.is_match(&url) {
                debug!(%url, pattern, "url matched");
                return Ok(());
            }
            observed = url;
            if start.elapsed() >= timeout {
                break;
            }
            sleep(interval).await;
        }

        Err(WorkflowError::AssertionTimeout {
            locator: "page url".to_string(),
            predicate: format!("to match /{}/", pattern),
            observed,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl Expect<'_> {
    /// Override the assertion timeout for this expectation only.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn to_be_visible(self) -> WorkflowResult<()> {
        self.poll(Predicate::Visible).await
    }

    pub async fn to_have_text(self, expected: impl Into<String>) -> WorkflowResult<()> {
        self.poll(Predicate::HasText(expected.into())).await
    }

    pub async fn to_contain_text(self, expected: impl Into<String>) -> WorkflowResult<()> {
        self.poll(Predicate::ContainsText(expected.into())).await
    }

    async fn poll(self, predicate: Predicate) -> WorkflowResult<()> {
        let start = Instant::now();
        let mut observed = "not found".to_string();

        loop {
            // Any session failure surfaces immediately; only an unsatisfied
            // predicate is retried.
            match self.check_once(&predicate).await? {
                Observation::Pass => {
                    debug!(locator = %self.locator, %predicate, "assertion held");
                    return Ok(());
                }
                Observation::Fail(value) => observed = value,
            }
            if start.elapsed() >= self.timeout {
                break;
            }
            sleep(self.interval).await;
        }

        Err(WorkflowError::AssertionTimeout {
            locator: self.locator.to_string(),
            predicate: predicate.to_string(),
            observed,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn check_once(&self, predicate: &Predicate) -> WorkflowResult<Observation> {
        let matches = self.locator.resolve(self.session.page()).await?;
        let Some(element) = matches.first() else {
            return Ok(Observation::Fail("not found".to_string()));
        };

        match predicate {
            Predicate::Visible => {
                if is_visible(element).await? {
                    Ok(Observation::Pass)
                } else {
                    Ok(Observation::Fail("present but hidden".to_string()))
                }
            }
            Predicate::HasText(expected) => {
                let text = rendered_text(element).await?;
                if text == *expected {
                    Ok(Observation::Pass)
                } else {
                    Ok(Observation::Fail(text))
                }
            }
            Predicate::ContainsText(expected) => {
                let text = rendered_text(element).await?;
                if text.contains(expected.as_str()) {
                    Ok(Observation::Pass)
                } else {
                    Ok(Observation::Fail(text))
                }
            }
        }
    }
}

async fn is_visible(element: &Element) -> WorkflowResult<bool> {
    let ret = element
        .call_js_fn(
            "function() { \
                const style = window.getComputedStyle(this); \
                return style.display !== 'none' \
                    && style.visibility !== 'hidden' \
                    && this.getClientRects().length > 0; \
            }",
            false,
        )
        .await
        .map_err(session_fault)?;
    Ok(ret
        .result
        .value
        .as_ref()
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_display() {
        assert_eq!(Predicate::Visible.to_string(), "to be visible");
        assert_eq!(
            Predicate::HasText("記事一覧".to_string()).to_string(),
            "to have text \"記事一覧\""
        );
        assert_eq!(
            Predicate::ContainsText("公開中".to_string()).to_string(),
            "to contain \"公開中\""
        );
    }
}
