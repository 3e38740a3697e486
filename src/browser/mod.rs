//! Production [`Driver`] over a locally launched Chrome.
//!
//! Handles are CDP node ids held in a registry; a handle whose node has
//! left the document resolves to `Stale` and is never silently reused.
//! Scoped queries tag their matches with a key attribute first (the same
//! trick the injected scripts use to make elements re-findable) and then
//! pick the tagged nodes up one by one.

pub mod injector;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::{json, Value};

use crate::driver::{Driver, ElementHandle, Query};
use crate::error::DriverError;

pub struct ChromeDriver {
    // Kept alive for the lifetime of the tab.
    _browser: Browser,
    tab: Arc<Tab>,
    nodes: RefCell<HashMap<u64, u32>>,
    next_handle: Cell<u64>,
    next_token: Cell<u64>,
}

impl ChromeDriver {
    /// Launch a fresh Chrome and open the working tab.
    pub fn launch(headless: bool) -> anyhow::Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .sandbox(false)
            .enable_gpu(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| anyhow!("Failed to build browser options: {}", e))?;

        let browser =
            Browser::new(options).map_err(|e| anyhow!("Failed to launch browser: {}", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to open tab: {}", e))?;

        Ok(ChromeDriver {
            _browser: browser,
            tab,
            nodes: RefCell::new(HashMap::new()),
            next_handle: Cell::new(1),
            next_token: Cell::new(1),
        })
    }

    fn register(&self, node_id: u32) -> ElementHandle {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        self.nodes.borrow_mut().insert(id, node_id);
        ElementHandle::new(id)
    }

    /// Re-resolve a handle against the live document. A node that has
    /// been detached or replaced resolves to `Stale`.
    fn resolve(&self, handle: &ElementHandle) -> Result<Element<'_>, DriverError> {
        let node_id = *self
            .nodes
            .borrow()
            .get(&handle.raw())
            .ok_or(DriverError::Stale)?;
        Element::new(&self.tab, node_id).map_err(|_| DriverError::Stale)
    }

    fn fresh_token(&self) -> String {
        let n = self.next_token.get();
        self.next_token.set(n + 1);
        format!("q{n}")
    }

    fn call_on(
        &self,
        handle: &ElementHandle,
        declaration: &str,
        args: Vec<Value>,
    ) -> Result<Value, DriverError> {
        let element = self.resolve(handle)?;
        let object = element
            .call_js_fn(declaration, args, false)
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(object.value.unwrap_or(Value::Null))
    }
}

/// Sort a raw CDP failure into the taxonomy the engine recovers from.
/// A missing content box means something else owns that point on screen,
/// which is the interception case for a CDP-dispatched click.
fn classify(err: anyhow::Error) -> DriverError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("detached") || lower.contains("no node") || lower.contains("node id") {
        DriverError::Stale
    } else if lower.contains("quad") || lower.contains("box model") || lower.contains("not visible")
    {
        DriverError::ClickIntercepted
    } else {
        DriverError::Protocol(message)
    }
}

impl Driver for ChromeDriver {
    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| DriverError::Protocol(e.to_string()))?;
        Ok(())
    }

    fn find_all(&self, query: &Query) -> Result<Vec<ElementHandle>, DriverError> {
        let found = match query {
            Query::Css(selector) => self.tab.find_elements(selector),
            Query::XPath(path) => self.tab.find_elements_by_xpath(path),
        };
        // No match surfaces as an error in the CDP layer; treat it as empty.
        let elements = match found {
            Ok(elements) => elements,
            Err(e) => {
                log::trace!("find_all({query}) empty: {e}");
                return Ok(Vec::new());
            }
        };
        Ok(elements
            .into_iter()
            .map(|element| self.register(element.node_id))
            .collect())
    }

    fn find_within(
        &self,
        root: &ElementHandle,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let token = self.fresh_token();
        let (declaration, needle) = match query {
            Query::Css(selector) => (injector::TAG_CSS_MATCHES_FN, selector),
            Query::XPath(path) => (injector::TAG_XPATH_MATCHES_FN, path),
        };
        let count = self
            .call_on(root, declaration, vec![json!(needle), json!(token)])?
            .as_u64()
            .unwrap_or(0);

        let mut handles = Vec::with_capacity(count as usize);
        for index in 0..count as usize {
            match self.tab.find_element(&injector::keyed_selector(&token, index)) {
                Ok(element) => handles.push(self.register(element.node_id)),
                Err(e) => log::trace!("tagged match {token}-{index} vanished: {e}"),
            }
        }
        Ok(handles)
    }

    fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        let element = self.resolve(handle)?;
        element.click().map(|_| ()).map_err(classify)
    }

    fn click_via_script(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        self.call_on(handle, injector::CLICK_FN, vec![]).map(|_| ())
    }

    fn run_script(&self, code: &str) -> Result<Value, DriverError> {
        let object = self
            .tab
            .evaluate(code, false)
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        self.call_on(handle, injector::SCROLL_CENTER_FN, vec![])
            .map(|_| ())
    }

    fn is_displayed(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self
            .call_on(handle, injector::VISIBLE_FN, vec![])?
            .as_bool()
            .unwrap_or(false))
    }

    fn is_enabled(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        Ok(self
            .call_on(handle, injector::ENABLED_FN, vec![])?
            .as_bool()
            .unwrap_or(false))
    }

    fn send_key(&self, handle: &ElementHandle, key: &str) -> Result<(), DriverError> {
        let element = self.resolve(handle)?;
        // Focus is best-effort; the key still lands on the document.
        let _ = element.focus();
        self.tab.press_key(key).map(|_| ()).map_err(classify)
    }

    fn text(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        let element = self.resolve(handle)?;
        element.get_inner_text().map_err(classify)
    }

    fn attr(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        match self.call_on(handle, injector::ATTR_FN, vec![json!(name)])? {
            Value::String(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }
}
