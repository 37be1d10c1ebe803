//! Blog E2E Workflow Verification
//!
//! Drives a real browser session through the blog's admin publish workflow
//! (log in → create an article → publish) and verifies that the published
//! article is rendered correctly to an unauthenticated reader. The
//! application under test is an external HTTP collaborator: only rendered
//! markup and URL shape are depended on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Workflow Runner (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner                                                     │
//! │    ├── ServerHandle      spawn + readiness-check the app    │
//! │    ├── Session           one Chromium instance over CDP     │
//! │    └── workflow::run     the six-state publish scenario     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Per transition: { arm NavigationBarrier, act, settle }     │
//! │  Per assertion:  re-resolve Locator, poll Predicate         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locators are immutable descriptors resolved fresh against the live DOM
//! on every use; the navigation barrier is armed before the action that
//! triggers the transition, so a fast page load cannot be missed.

pub mod assertions;
pub mod barrier;
pub mod config;
pub mod error;
pub mod locator;
pub mod runner;
pub mod server;
pub mod session;
pub mod workflow;

pub use config::{Config, Credentials};
pub use error::{WorkflowError, WorkflowResult};
pub use locator::{Locator, Role};
pub use runner::{Runner, WorkflowReport};
pub use session::Session;
pub use workflow::ArticleDraft;
