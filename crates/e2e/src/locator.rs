//! Declarative element locators
//!
//! A [`Locator`] is an immutable description of zero-or-more elements.
//! Nothing is fetched at construction time; resolution runs against the live
//! DOM each time an operation needs it, so the same descriptor stays valid
//! across page transitions. Combinators nest rather than mutate: every
//! builder call returns a new value.
//!
//! "Not found yet" is an empty match set, never an error. The assertion
//! engine owns retrying; the session owns the single-element contract.

use std::fmt;

use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::WorkflowResult;

/// Accessible roles the engine can query by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Button,
    Link,
    Heading(u8),
}

impl Role {
    /// CSS candidates carrying this role in server-rendered markup.
    fn css_candidates(&self) -> String {
        match *self {
            Role::Button => "button, input[type='submit'], input[type='button']".to_string(),
            Role::Link => "a[href]".to_string(),
            Role::Heading(level) => format!("h{}", level.clamp(1, 6)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Button => write!(f, "button"),
            Role::Link => write!(f, "link"),
            Role::Heading(level) => write!(f, "heading[level={}]", level),
        }
    }
}

/// An immutable, lazily-evaluated element descriptor.
#[derive(Debug, Clone)]
pub struct Locator {
    kind: LocatorKind,
}

#[derive(Debug, Clone)]
enum LocatorKind {
    /// CSS selector path
    Css(String),
    /// Accessible role, optionally filtered by accessible name
    Role { role: Role, name: Option<String> },
    /// Form control referenced by its label text
    Label(String),
    /// Keep only matches whose rendered text contains the needle
    WithText { base: Box<Locator>, text: String },
    /// Keep only matches whose subtree matches the filter descriptor
    Has { base: Box<Locator>, filter: Box<Locator> },
    /// Evaluate only within the subtree(s) matched by the ancestor
    Within { ancestor: Box<Locator>, inner: Box<Locator> },
    /// Ordinal selection after filtering
    Nth { base: Box<Locator>, index: usize },
}

impl Locator {
    /// Elements matching a CSS selector.
    pub fn css(selector: impl Into<String>) -> Self {
        Self { kind: LocatorKind::Css(selector.into()) }
    }

    /// Elements with the given accessible role and name.
    pub fn role(role: Role, name: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Role { role, name: Some(name.into()) },
        }
    }

    /// A button with the given accessible name.
    pub fn button(name: impl Into<String>) -> Self {
        Self::role(Role::Button, name)
    }

    /// A link with the given accessible name.
    pub fn link(name: impl Into<String>) -> Self {
        Self::role(Role::Link, name)
    }

    /// A heading of the given level, regardless of its text.
    pub fn heading(level: u8) -> Self {
        Self {
            kind: LocatorKind::Role { role: Role::Heading(level), name: None },
        }
    }

    /// The form control associated with a `<label>` containing this text,
    /// either through its `for` attribute or by nesting.
    pub fn label(text: impl Into<String>) -> Self {
        Self { kind: LocatorKind::Label(text.into()) }
    }

    /// Keep only matches whose rendered text contains `text`.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::WithText { base: Box::new(self), text: text.into() },
        }
    }

    /// Keep only matches whose subtree contains a match for `filter`.
    pub fn has(self, filter: Locator) -> Self {
        Self {
            kind: LocatorKind::Has { base: Box::new(self), filter: Box::new(filter) },
        }
    }

    /// Evaluate this descriptor only inside the subtree matched by `ancestor`.
    pub fn within(self, ancestor: Locator) -> Self {
        Self {
            kind: LocatorKind::Within { ancestor: Box::new(ancestor), inner: Box::new(self) },
        }
    }

    /// The k-th match (zero-based) after all filtering.
    pub fn nth(self, index: usize) -> Self {
        Self {
            kind: LocatorKind::Nth { base: Box::new(self), index },
        }
    }

    /// The first match after all filtering.
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Resolve against the current page state. Returns every match, in
    /// document order; an empty vector when nothing matches yet.
    pub async fn resolve(&self, page: &Page) -> WorkflowResult<Vec<Element>> {
        self.resolve_in(Scope::Page(page)).await
    }

    fn resolve_in<'a>(&'a self, scope: Scope<'a>) -> BoxFuture<'a, WorkflowResult<Vec<Element>>> {
        async move {
            match &self.kind {
                LocatorKind::Css(selector) => scope.query(selector).await,
                LocatorKind::Role { role, name } => {
                    let candidates = scope.query(&role.css_candidates()).await?;
                    match name {
                        None => Ok(candidates),
                        Some(name) => {
                            let mut matched = Vec::new();
                            for el in candidates {
                                if accessible_name(&el).await? == name.trim() {
                                    matched.push(el);
                                }
                            }
                            Ok(matched)
                        }
                    }
                }
                LocatorKind::Label(text) => resolve_label(scope, text).await,
                LocatorKind::WithText { base, text } => {
                    let mut matched = Vec::new();
                    for el in base.resolve_in(scope).await? {
                        if rendered_text(&el).await?.contains(text.as_str()) {
                            matched.push(el);
                        }
                    }
                    Ok(matched)
                }
                LocatorKind::Has { base, filter } => {
                    let mut matched = Vec::new();
                    for el in base.resolve_in(scope).await? {
                        let inner = filter.resolve_in(Scope::Node(&el)).await?;
                        if !inner.is_empty() {
                            matched.push(el);
                        }
                    }
                    Ok(matched)
                }
                LocatorKind::Within { ancestor, inner } => {
                    let mut matched = Vec::new();
                    for scope_el in ancestor.resolve_in(scope).await? {
                        matched.extend(inner.resolve_in(Scope::Node(&scope_el)).await?);
                    }
                    Ok(matched)
                }
                LocatorKind::Nth { base, index } => {
                    let mut all = base.resolve_in(scope).await?;
                    if *index < all.len() {
                        Ok(vec![all.swap_remove(*index)])
                    } else {
                        Ok(Vec::new())
                    }
                }
            }
        }
        .boxed()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LocatorKind::Css(selector) => write!(f, "css={}", selector),
            LocatorKind::Role { role, name: Some(name) } => {
                write!(f, "role={}[name=\"{}\"]", role, name)
            }
            LocatorKind::Role { role, name: None } => write!(f, "role={}", role),
            LocatorKind::Label(text) => write!(f, "label=\"{}\"", text),
            LocatorKind::WithText { base, text } => write!(f, "{}[text*=\"{}\"]", base, text),
            LocatorKind::Has { base, filter } => write!(f, "{} >> has({})", base, filter),
            LocatorKind::Within { ancestor, inner } => write!(f, "{} >> {}", ancestor, inner),
            LocatorKind::Nth { base, index } => write!(f, "{} >> nth={}", base, index),
        }
    }
}

/// Where a resolution step queries: the whole document or one subtree.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Page(&'a Page),
    Node(&'a Element),
}

impl Scope<'_> {
    async fn query(&self, selector: &str) -> WorkflowResult<Vec<Element>> {
        let found = match self {
            Scope::Page(page) => page.find_elements(selector).await,
            Scope::Node(element) => element.find_elements(selector).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Trimmed rendered text of an element; empty when it has none.
pub(crate) async fn rendered_text(element: &Element) -> WorkflowResult<String> {
    match element.inner_text().await {
        Ok(Some(text)) => Ok(text.trim().to_string()),
        Ok(None) => Ok(String::new()),
        Err(CdpError::NotFound) => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Accessible-name approximation for role matching: rendered text, falling
/// back to the `value` attribute for `<input type=submit>` style controls.
async fn accessible_name(element: &Element) -> WorkflowResult<String> {
    let text = rendered_text(element).await?;
    if !text.is_empty() {
        return Ok(text);
    }
    match element.attribute("value").await {
        Ok(Some(value)) => Ok(value.trim().to_string()),
        Ok(None) | Err(CdpError::NotFound) => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

async fn resolve_label(scope: Scope<'_>, text: &str) -> WorkflowResult<Vec<Element>> {
    let mut matched = Vec::new();
    for label in scope.query("label").await? {
        if !rendered_text(&label).await?.contains(text) {
            continue;
        }
        match label.attribute("for").await {
            Ok(Some(target_id)) => {
                // Attribute-equality form sidesteps CSS id escaping rules
                let selector = format!("[id='{}']", target_id);
                matched.extend(scope.query(&selector).await?);
            }
            Ok(None) | Err(CdpError::NotFound) => {
                matched.extend(
                    Scope::Node(&label).query("input, select, textarea").await?,
                );
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_role_and_css() {
        assert_eq!(Locator::button("保存").to_string(), "role=button[name=\"保存\"]");
        assert_eq!(Locator::heading(2).to_string(), "role=heading[level=2]");
        assert_eq!(Locator::css("table tbody tr").to_string(), "css=table tbody tr");
        assert_eq!(Locator::label("公開する").to_string(), "label=\"公開する\"");
    }

    #[test]
    fn test_display_composition() {
        let row = Locator::css("table tbody tr")
            .has(Locator::css("td").with_text("title"))
            .first();
        assert_eq!(
            row.to_string(),
            "css=table tbody tr >> has(css=td[text*=\"title\"]) >> nth=0"
        );

        let cell = Locator::css("td").nth(2).within(row);
        assert!(cell.to_string().ends_with(">> css=td >> nth=2"));
    }

    #[test]
    fn test_composition_does_not_mutate() {
        let base = Locator::css("main article");
        let filtered = base.clone().has(Locator::css("h3 a").with_text("T"));
        let ordinal = filtered.clone().first();

        // Each combinator produced a new descriptor; the originals render
        // exactly as before.
        assert_eq!(base.to_string(), "css=main article");
        assert_eq!(
            filtered.to_string(),
            "css=main article >> has(css=h3 a[text*=\"T\"])"
        );
        assert_eq!(
            ordinal.to_string(),
            "css=main article >> has(css=h3 a[text*=\"T\"]) >> nth=0"
        );
    }

    #[test]
    fn test_role_css_candidates() {
        assert_eq!(Role::Heading(2).css_candidates(), "h2");
        assert_eq!(Role::Heading(9).css_candidates(), "h6");
        assert!(Role::Button.css_candidates().contains("input[type='submit']"));
        assert_eq!(Role::Link.css_candidates(), "a[href]");
    }
}
