//! The admin publish workflow
//!
//! One scenario, expressed as a forward-only sequence of states:
//! unauthenticated → admin article list → new-article form → published list
//! → public home → public article page. Every transition pairs one
//! triggering action with one navigation-barrier wait, and the slug
//! extracted from the admin list is the only value carried forward into the
//! public half. The first failure aborts the remainder and propagates as-is.

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{WorkflowError, WorkflowResult};
use crate::locator::Locator;
use crate::session::Session;

/// Article data generated once per run and never mutated afterwards.
/// The salt keeps titles unique across repeated runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub summary: String,
    pub content: String,
}

impl ArticleDraft {
    /// Generate a draft salted with the current wall-clock millisecond.
    pub fn generate() -> Self {
        Self::from_salt(Utc::now().timestamp_millis())
    }

    /// Deterministic construction from an explicit salt.
    pub fn from_salt(salt: i64) -> Self {
        Self {
            title: format!("E2E Article {}", salt),
            summary: format!("Summary generated at {}.", salt),
            content: format!(
                "This article was created by an automated browser test.\nTimestamp: {}.",
                salt
            ),
        }
    }

    /// First line of the body, used for the public-page containment check.
    pub fn content_first_line(&self) -> &str {
        self.content.lines().next().unwrap_or("")
    }
}

/// A completed workflow step, for the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub duration_ms: u64,
}

/// The extracted slug must be usable as a path segment before any
/// navigation is built from it.
pub fn validate_slug(raw: &str) -> WorkflowResult<String> {
    let slug = raw.trim();
    if slug.is_empty() {
        return Err(WorkflowError::Extraction(
            "extracted article slug is empty; cannot build the public article path".to_string(),
        ));
    }
    Ok(slug.to_string())
}

/// Run the whole scenario. Completed steps are appended to `steps` so the
/// report shows how far a failing run got.
pub async fn run(session: &Session, steps: &mut Vec<StepOutcome>) -> WorkflowResult<ArticleDraft> {
    let draft = ArticleDraft::generate();
    info!("Generated article draft: {}", draft.title);

    timed(steps, "log in as administrator", log_in(session)).await?;
    timed(steps, "compose and publish article", compose(session, &draft)).await?;
    let slug = timed(
        steps,
        "confirm publication and extract slug",
        confirm_published(session, &draft),
    )
    .await?;
    timed(
        steps,
        "verify article as anonymous reader",
        read_as_visitor(session, &draft, &slug),
    )
    .await?;

    Ok(draft)
}

async fn timed<T, F>(
    steps: &mut Vec<StepOutcome>,
    name: &'static str,
    step: F,
) -> WorkflowResult<T>
where
    F: Future<Output = WorkflowResult<T>>,
{
    let start = Instant::now();
    let value = step.await?;
    let duration_ms = start.elapsed().as_millis() as u64;
    info!("{} ({} ms)", name, duration_ms);
    steps.push(StepOutcome {
        name: name.to_string(),
        duration_ms,
    });
    Ok(value)
}

/// Unauthenticated → Authenticated(AdminHome)
async fn log_in(session: &Session) -> WorkflowResult<()> {
    let credentials = session.config().credentials.clone();

    session.goto_and_settle("/login").await?;
    session
        .fill(&Locator::css("#username"), &credentials.username)
        .await?;
    session
        .fill(&Locator::css("#password"), &credentials.password)
        .await?;
    session.click_and_settle(&Locator::button("ログイン")).await?;

    session.expect_url(r"/admin/articles$").await?;
    session.expect(Locator::heading(2)).to_have_text("記事一覧").await?;
    Ok(())
}

/// Authenticated(AdminHome) → Composing(NewArticleForm) → Published(ArticleList)
async fn compose(session: &Session, draft: &ArticleDraft) -> WorkflowResult<()> {
    session
        .click_and_settle(&Locator::link("新規記事を作成"))
        .await?;
    session.expect(Locator::heading(2)).to_have_text("新規記事").await?;

    session.fill(&Locator::css("#title"), &draft.title).await?;
    session.fill(&Locator::css("#summary"), &draft.summary).await?;
    session.fill(&Locator::css("#content"), &draft.content).await?;
    session.check(&Locator::label("公開する")).await?;

    session.click_and_settle(&Locator::button("保存")).await?;
    Ok(())
}

/// In Published(ArticleList): confirm persistence and pull the slug out of
/// the new article's row.
async fn confirm_published(session: &Session, draft: &ArticleDraft) -> WorkflowResult<String> {
    session
        .expect(Locator::css(".alert.success"))
        .to_contain_text("記事を作成しました")
        .await?;

    let row = Locator::css("table tbody tr")
        .has(Locator::css("td").with_text(draft.title.as_str()))
        .first();

    session.expect(row.clone()).to_be_visible().await?;
    session
        .expect(Locator::css("td").nth(2).within(row.clone()))
        .to_contain_text("公開中")
        .await?;

    let raw = session
        .inner_text(&Locator::css("td:nth-child(2) a").within(row))
        .await?;
    let slug = validate_slug(&raw)?;
    info!("Extracted article slug: {}", slug);
    Ok(slug)
}

/// Published(ArticleList) → PublicHome → PublicDetail(Article)
async fn read_as_visitor(
    session: &Session,
    draft: &ArticleDraft,
    slug: &str,
) -> WorkflowResult<()> {
    session.goto_and_settle("/").await?;

    let card = Locator::css("main article")
        .has(Locator::css("h3 a").with_text(draft.title.as_str()))
        .first();

    session.expect(card.clone()).to_be_visible().await?;
    session
        .expect(Locator::css("p").first().within(card.clone()))
        .to_contain_text(draft.summary.as_str())
        .await?;

    session
        .click_and_settle(&Locator::link(draft.title.as_str()).within(card))
        .await?;

    session
        .expect_url(&format!(r"/posts/{}$", regex::escape(slug)))
        .await?;
    session
        .expect(Locator::heading(2))
        .to_have_text(draft.title.as_str())
        .await?;
    session
        .expect(Locator::css("main article div"))
        .to_contain_text(draft.content_first_line())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_distinct_salts_give_distinct_drafts() {
        let a = ArticleDraft::from_salt(1_700_000_000_000);
        let b = ArticleDraft::from_salt(1_700_000_000_001);
        assert_ne!(a.title, b.title);
        assert_ne!(a.summary, b.summary);
        assert_ne!(a.content, b.content);
    }

    #[test]
    fn test_draft_embeds_salt_in_every_field() {
        let draft = ArticleDraft::from_salt(42);
        assert!(draft.title.contains("42"));
        assert!(draft.summary.contains("42"));
        assert!(draft.content.contains("42"));
    }

    #[test]
    fn test_content_first_line() {
        let draft = ArticleDraft::from_salt(7);
        assert_eq!(
            draft.content_first_line(),
            "This article was created by an automated browser test."
        );
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace only")]
    #[test_case("\n\t" ; "newline and tab")]
    fn test_validate_slug_rejects(raw: &str) {
        assert!(matches!(
            validate_slug(raw),
            Err(WorkflowError::Extraction(_))
        ));
    }

    #[test]
    fn test_validate_slug_trims() {
        assert_eq!(validate_slug("  my-article \n").unwrap(), "my-article");
    }
}
