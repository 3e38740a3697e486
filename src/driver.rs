//! Capability surface of the browser collaborator.
//!
//! The engine drives the document exclusively through this trait, so the
//! whole extraction state machine can run against the in-memory fake in
//! `tests/` as well as the real Chrome session in `browser`.

use serde_json::Value;

use crate::error::DriverError;

/// A document query. Structural lookups use CSS; text- and attribute-path
/// lookups (tab labels, ancestor walks) use XPath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

impl Query {
    pub fn css(selector: impl Into<String>) -> Self {
        Query::Css(selector.into())
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Query::XPath(path.into())
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Css(s) => write!(f, "css:{s}"),
            Query::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Opaque reference to a live document element.
///
/// A handle may go stale after any DOM mutation. Handles that must survive
/// an overlay open/close boundary are never kept; they are re-acquired by
/// the row's food id instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn new(raw: u64) -> Self {
        ElementHandle(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

pub trait Driver {
    fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// All current matches for `query` in the document. No match is an
    /// empty vec, not an error.
    fn find_all(&self, query: &Query) -> Result<Vec<ElementHandle>, DriverError>;

    /// All current matches for `query` inside `root`'s subtree.
    fn find_within(
        &self,
        root: &ElementHandle,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Synthetic user click. May fail with `ClickIntercepted` or `Stale`.
    fn click(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    /// Programmatic `el.click()`, the fallback when a direct click is
    /// blocked by an element on top.
    fn click_via_script(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    /// Evaluate a script against the live document and return its value.
    fn run_script(&self, code: &str) -> Result<Value, DriverError>;

    fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    fn send_key(&self, handle: &ElementHandle, key: &str) -> Result<(), DriverError>;

    /// Flattened visible text of the element's subtree.
    fn text(&self, handle: &ElementHandle) -> Result<String, DriverError>;

    fn attr(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>, DriverError>;
}

/// Click with the programmatic fallback on interception. Used everywhere a
/// single activation is wanted; bounded retries on top of this live in the
/// row processor.
pub fn click_with_fallback(driver: &dyn Driver, handle: &ElementHandle) -> Result<(), DriverError> {
    match driver.click(handle) {
        Err(DriverError::ClickIntercepted) => {
            log::warn!("click intercepted, falling back to programmatic click");
            driver.click_via_script(handle)
        }
        other => other,
    }
}

/// First handle in `handles` that is both displayed and enabled.
pub fn first_interactable(
    driver: &dyn Driver,
    handles: &[ElementHandle],
) -> Option<ElementHandle> {
    handles
        .iter()
        .find(|h| {
            driver.is_displayed(h).unwrap_or(false) && driver.is_enabled(h).unwrap_or(false)
        })
        .cloned()
}
