//! Browser session controller
//!
//! One [`Session`] owns one headless Chromium instance bound to a fixed base
//! origin: the browser process, the single page, and the background task
//! driving the CDP WebSocket. Interactions resolve locators exactly once and
//! enforce the single-element contract; settling after a navigation is the
//! barrier's job and the two are paired by the `*_and_settle` operations.

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::barrier::NavigationBarrier;
use crate::config::Config;
use crate::error::{WorkflowError, WorkflowResult};
use crate::locator::Locator;

/// An exclusive browser session against the application under test.
pub struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    config: Config,
    // Held for the lifetime of the browser process
    _profile_dir: TempDir,
}

impl Session {
    /// Establish a session: verify the target origin is reachable within the
    /// startup timeout, then launch the browser and open a blank page.
    pub async fn open(config: &Config) -> WorkflowResult<Self> {
        probe_origin(config).await?;

        let profile_dir = tempfile::tempdir()?;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .window_size(config.viewport.width, config.viewport.height)
            .user_data_dir(profile_dir.path());
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(WorkflowError::Session)?;

        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(session_fault)?;

        // Drives CDP WebSocket traffic until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler loop ended");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(session_fault)?;

        Ok(Self {
            browser,
            page,
            handler_task,
            config: config.clone(),
            _profile_dir: profile_dir,
        })
    }

    pub(crate) fn page(&self) -> &Page {
        &self.page
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Request a navigation to a path under the base origin. Does not wait
    /// for completion; pair with a barrier or use [`Session::goto_and_settle`].
    pub async fn navigate(&self, path: &str) -> WorkflowResult<()> {
        let url = self.absolute(path);
        debug!(%url, "navigate");
        self.page.goto(url).await.map_err(session_fault)?;
        Ok(())
    }

    /// Arm a barrier, navigate, and block until the new page settles.
    pub async fn goto_and_settle(&self, path: &str) -> WorkflowResult<()> {
        let barrier =
            NavigationBarrier::arm(&self.page, self.config.navigation_timeout()).await?;
        self.navigate(path).await?;
        barrier.wait(&self.page).await
    }

    /// Arm a barrier, click the element, and block until the resulting
    /// navigation settles. The barrier is armed before the click so a fast
    /// transition cannot be missed.
    pub async fn click_and_settle(&self, locator: &Locator) -> WorkflowResult<()> {
        let barrier =
            NavigationBarrier::arm(&self.page, self.config.navigation_timeout()).await?;
        self.click(locator).await?;
        barrier.wait(&self.page).await
    }

    /// Type a value into the input matched by the locator.
    pub async fn fill(&self, locator: &Locator, value: &str) -> WorkflowResult<()> {
        debug!(locator = %locator, "fill");
        let element = self.resolve_one(locator).await?;
        element.click().await.map_err(session_fault)?;
        element.type_str(value).await.map_err(session_fault)?;
        Ok(())
    }

    /// Check a checkbox if it is not already checked.
    pub async fn check(&self, locator: &Locator) -> WorkflowResult<()> {
        debug!(locator = %locator, "check");
        let element = self.resolve_one(locator).await?;
        let ret = element
            .call_js_fn("function() { return this.checked === true; }", false)
            .await
            .map_err(session_fault)?;
        let checked = ret
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !checked {
            element.click().await.map_err(session_fault)?;
        }
        Ok(())
    }

    /// Click the element matched by the locator.
    pub async fn click(&self, locator: &Locator) -> WorkflowResult<()> {
        debug!(locator = %locator, "click");
        let element = self.resolve_one(locator).await?;
        element.click().await.map_err(session_fault)?;
        Ok(())
    }

    /// Trimmed rendered text of the single element matched by the locator.
    pub async fn inner_text(&self, locator: &Locator) -> WorkflowResult<String> {
        let element = self.resolve_one(locator).await?;
        let text = element.inner_text().await.map_err(session_fault)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    /// Current URL of the page.
    pub async fn current_url(&self) -> WorkflowResult<String> {
        self.page
            .url()
            .await
            .map_err(session_fault)?
            .ok_or_else(|| WorkflowError::Session("page reported no URL".to_string()))
    }

    /// Release the session. The runner calls this on every exit path.
    pub async fn close(mut self) -> WorkflowResult<()> {
        info!("Closing browser session");
        self.browser.close().await.map_err(session_fault)?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }

    async fn resolve_one(&self, locator: &Locator) -> WorkflowResult<Element> {
        let mut matches = locator.resolve(&self.page).await?;
        match matches.len() {
            0 => Err(WorkflowError::ElementNotFound {
                locator: locator.to_string(),
            }),
            1 => Ok(matches.swap_remove(0)),
            count => Err(WorkflowError::AmbiguousElement {
                locator: locator.to_string(),
                count,
            }),
        }
    }

    fn absolute(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// CDP transport failures mean the session itself is gone; everything else
/// keeps its protocol-level error.
pub(crate) fn session_fault(e: CdpError) -> WorkflowError {
    match e {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            WorkflowError::Session(e.to_string())
        }
        other => WorkflowError::Cdp(other),
    }
}

/// Poll the target origin until it answers, within the startup timeout.
/// Reachability is all this establishes; any non-5xx response counts.
async fn probe_origin(config: &Config) -> WorkflowResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let url = format!("{}/login", config.base_url.trim_end_matches('/'));

    let start = Instant::now();
    let mut attempts = 0usize;

    while start.elapsed() < config.startup_timeout() {
        attempts += 1;
        match client.get(&url).send().await {
            Ok(resp) if !resp.status().is_server_error() => return Ok(()),
            Ok(resp) => {
                warn!("Origin probe returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to become reachable...", config.base_url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Origin probe error: {}", e);
                }
            }
        }
        sleep(Duration::from_millis(200)).await;
    }

    Err(WorkflowError::Session(format!(
        "target origin {} unreachable after {} attempts",
        config.base_url, attempts
    )))
}
