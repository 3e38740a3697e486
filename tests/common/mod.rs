//! In-memory `Driver` over a small node tree, so the engine's control
//! flow can be exercised without a browser. CSS support covers the
//! selector subset the engine issues (type/class/id/attribute compounds,
//! descendant and child combinators, `:scope >` prefixes, selector
//! lists); XPath queries resolve through a literal registry populated by
//! each test.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde_json::Value;

use fct_harvester::browser::injector;
use fct_harvester::config::TimingConfig;
use fct_harvester::driver::{Driver, ElementHandle, Query};
use fct_harvester::error::DriverError;
use fct_harvester::records::ExtractionSession;
use fct_harvester::sink::RecordSink;

pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        wait_timeout_ms: 50,
        poll_interval_ms: 2,
        settle_ms: 0,
        click_attempts: 3,
    }
}

pub fn handle(index: usize) -> ElementHandle {
    ElementHandle::new(index as u64)
}

pub fn query_string(query: &Query) -> String {
    match query {
        Query::Css(s) | Query::XPath(s) => s.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub displayed: bool,
    pub enabled: bool,
}

pub fn node(tag: &str) -> NodeSpec {
    NodeSpec {
        tag: tag.to_string(),
        classes: Vec::new(),
        attrs: Vec::new(),
        text: String::new(),
        displayed: true,
        enabled: true,
    }
}

impl NodeSpec {
    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

struct Node {
    spec: NodeSpec,
    parent: Option<usize>,
    children: Vec<usize>,
    detached: bool,
}

#[derive(Debug, Clone)]
pub enum ClickEffect {
    Show(usize),
    Hide(usize),
    Disable(usize),
    /// Display the overlay node and mark overlay state visible.
    OverlayShow(usize),
    OverlayClear,
}

#[derive(Default)]
pub struct CountingSink {
    pub flushes: Vec<(usize, usize)>,
}

impl RecordSink for CountingSink {
    fn flush(&mut self, session: &ExtractionSession) -> anyhow::Result<()> {
        self.flushes
            .push((session.basic.len(), session.detailed.len()));
        Ok(())
    }
}

pub struct FakeDriver {
    nodes: RefCell<Vec<Node>>,
    xpath: RefCell<HashMap<String, Vec<usize>>>,
    effects: RefCell<HashMap<usize, Vec<ClickEffect>>>,
    stale_once: RefCell<Vec<usize>>,
    intercepted: RefCell<Vec<usize>>,
    pub clicks: RefCell<Vec<usize>>,
    pub js_clicks: RefCell<Vec<usize>>,
    pub keys: RefCell<Vec<(usize, String)>>,
    pub scripts: RefCell<Vec<String>>,
    pub navigations: RefCell<Vec<String>>,
    pub overlay_visible: Cell<bool>,
    /// When set, the force-clear script runs but changes nothing.
    pub force_clear_inert: Cell<bool>,
}

impl FakeDriver {
    /// A document with a displayed `<body>` at index 0.
    pub fn new() -> Self {
        let driver = FakeDriver {
            nodes: RefCell::new(Vec::new()),
            xpath: RefCell::new(HashMap::new()),
            effects: RefCell::new(HashMap::new()),
            stale_once: RefCell::new(Vec::new()),
            intercepted: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            js_clicks: RefCell::new(Vec::new()),
            keys: RefCell::new(Vec::new()),
            scripts: RefCell::new(Vec::new()),
            navigations: RefCell::new(Vec::new()),
            overlay_visible: Cell::new(false),
            force_clear_inert: Cell::new(false),
        };
        driver.nodes.borrow_mut().push(Node {
            spec: node("body"),
            parent: None,
            children: Vec::new(),
            detached: false,
        });
        driver
    }

    pub fn add(&self, parent: usize, spec: NodeSpec) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len();
        nodes.push(Node {
            spec,
            parent: Some(parent),
            children: Vec::new(),
            detached: false,
        });
        nodes[parent].children.push(index);
        index
    }

    pub fn on_click(&self, index: usize, effects: Vec<ClickEffect>) {
        self.effects.borrow_mut().insert(index, effects);
    }

    pub fn register_xpath(&self, path: &str, indices: Vec<usize>) {
        self.xpath.borrow_mut().insert(path.to_string(), indices);
    }

    pub fn set_displayed(&self, index: usize, displayed: bool) {
        self.nodes.borrow_mut()[index].spec.displayed = displayed;
    }

    pub fn detach(&self, index: usize) {
        self.nodes.borrow_mut()[index].detached = true;
    }

    /// The next native click on `index` fails with `Stale`.
    pub fn stale_once(&self, index: usize) {
        self.stale_once.borrow_mut().push(index);
    }

    /// Native clicks on `index` always fail with `ClickIntercepted`.
    pub fn intercept(&self, index: usize) {
        self.intercepted.borrow_mut().push(index);
    }

    fn index(&self, handle: &ElementHandle) -> Result<usize, DriverError> {
        let index = handle.raw() as usize;
        let nodes = self.nodes.borrow();
        match nodes.get(index) {
            Some(node) if !node.detached => Ok(index),
            _ => Err(DriverError::Stale),
        }
    }

    fn parent_of(&self, index: usize) -> Option<usize> {
        self.nodes.borrow()[index].parent
    }

    fn descendants(&self, root: usize) -> Vec<usize> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<usize> = nodes[root].children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            out.push(index);
            stack.extend(nodes[index].children.iter().rev().copied());
        }
        out
    }

    fn attr_of(&self, index: usize, name: &str) -> Option<String> {
        let nodes = self.nodes.borrow();
        let spec = &nodes[index].spec;
        if let Some((_, value)) = spec.attrs.iter().find(|(n, _)| n == name) {
            return Some(value.clone());
        }
        if name == "class" && !spec.classes.is_empty() {
            return Some(spec.classes.join(" "));
        }
        None
    }

    fn flat_text(&self, index: usize) -> String {
        fn collect(nodes: &[Node], index: usize, parts: &mut Vec<String>) {
            let node = &nodes[index];
            if !node.spec.text.is_empty() {
                parts.push(node.spec.text.clone());
            }
            for &child in &node.children {
                collect(nodes, child, parts);
            }
        }
        let nodes = self.nodes.borrow();
        let mut parts = Vec::new();
        collect(&nodes, index, &mut parts);
        parts.join("\n")
    }

    fn apply_effects(&self, index: usize) {
        let effects = self.effects.borrow().get(&index).cloned().unwrap_or_default();
        for effect in effects {
            match effect {
                ClickEffect::Show(target) => self.set_displayed(target, true),
                ClickEffect::Hide(target) => self.set_displayed(target, false),
                ClickEffect::Disable(target) => {
                    self.nodes.borrow_mut()[target].spec.enabled = false;
                }
                ClickEffect::OverlayShow(target) => {
                    self.set_displayed(target, true);
                    self.overlay_visible.set(true);
                }
                ClickEffect::OverlayClear => self.clear_overlays(),
            }
        }
    }

    fn clear_overlays(&self) {
        let mut nodes = self.nodes.borrow_mut();
        for node in nodes.iter_mut() {
            if node.spec.classes.iter().any(|c| c == "modal") {
                node.spec.displayed = false;
            }
        }
        drop(nodes);
        self.overlay_visible.set(false);
    }

    fn query_css(&self, selector: &str, scope: Option<usize>) -> Vec<usize> {
        let selectors: Vec<Vec<(Comb, Compound)>> = split_list(selector)
            .iter()
            .map(|s| parse_complex(s))
            .collect();
        let candidates: Vec<usize> = match scope {
            Some(root) => self.descendants(root),
            None => (0..self.nodes.borrow().len()).collect(),
        };
        candidates
            .into_iter()
            .filter(|&index| !self.nodes.borrow()[index].detached)
            .filter(|&index| {
                selectors
                    .iter()
                    .any(|parts| self.matches_complex(index, parts, scope))
            })
            .collect()
    }

    fn matches_complex(
        &self,
        index: usize,
        parts: &[(Comb, Compound)],
        scope: Option<usize>,
    ) -> bool {
        if parts.is_empty() {
            return false;
        }
        if !self.matches_compound(index, &parts[parts.len() - 1].1, scope) {
            return false;
        }
        let mut current = index;
        for i in (1..parts.len()).rev() {
            let comb = parts[i].0;
            let target = &parts[i - 1].1;
            match comb {
                Comb::Child => match self.parent_of(current) {
                    Some(parent) if self.matches_compound(parent, target, scope) => {
                        current = parent;
                    }
                    _ => return false,
                },
                Comb::Descendant => {
                    let mut cursor = self.parent_of(current);
                    let mut found = None;
                    while let Some(parent) = cursor {
                        if self.matches_compound(parent, target, scope) {
                            found = Some(parent);
                            break;
                        }
                        cursor = self.parent_of(parent);
                    }
                    match found {
                        Some(parent) => current = parent,
                        None => return false,
                    }
                }
            }
        }
        true
    }

    fn matches_compound(&self, index: usize, compound: &Compound, scope: Option<usize>) -> bool {
        if compound.scope {
            return Some(index) == scope;
        }
        {
            let nodes = self.nodes.borrow();
            let spec = &nodes[index].spec;
            if let Some(tag) = &compound.tag {
                if !spec.tag.eq_ignore_ascii_case(tag) {
                    return false;
                }
            }
            for class in &compound.classes {
                if !spec.classes.iter().any(|c| c == class) {
                    return false;
                }
            }
        }
        if let Some(id) = &compound.id {
            if self.attr_of(index, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        for (name, op, value) in &compound.attrs {
            let Some(actual) = self.attr_of(index, name) else {
                return false;
            };
            let ok = match op {
                AttrOp::Eq => actual == *value,
                AttrOp::Contains => actual.contains(value.as_str()),
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

impl Driver for FakeDriver {
    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.navigations.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn find_all(&self, query: &Query) -> Result<Vec<ElementHandle>, DriverError> {
        let indices = match query {
            Query::Css(selector) => self.query_css(selector, None),
            Query::XPath(path) => self
                .xpath
                .borrow()
                .get(path)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|&i| !self.nodes.borrow()[i].detached)
                .collect(),
        };
        Ok(indices.into_iter().map(handle).collect())
    }

    fn find_within(
        &self,
        root: &ElementHandle,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let root = self.index(root)?;
        let indices = match query {
            Query::Css(selector) => self.query_css(selector, Some(root)),
            Query::XPath(path) if path == ".." => {
                self.parent_of(root).into_iter().collect()
            }
            Query::XPath(path) => self.xpath.borrow().get(path).cloned().unwrap_or_default(),
        };
        Ok(indices.into_iter().map(handle).collect())
    }

    fn click(&self, handle_: &ElementHandle) -> Result<(), DriverError> {
        let index = self.index(handle_)?;
        {
            let mut stale = self.stale_once.borrow_mut();
            if let Some(pos) = stale.iter().position(|&i| i == index) {
                stale.remove(pos);
                return Err(DriverError::Stale);
            }
        }
        if self.intercepted.borrow().contains(&index) {
            return Err(DriverError::ClickIntercepted);
        }
        self.clicks.borrow_mut().push(index);
        self.apply_effects(index);
        Ok(())
    }

    fn click_via_script(&self, handle_: &ElementHandle) -> Result<(), DriverError> {
        let index = self.index(handle_)?;
        self.js_clicks.borrow_mut().push(index);
        self.apply_effects(index);
        Ok(())
    }

    fn run_script(&self, code: &str) -> Result<Value, DriverError> {
        self.scripts.borrow_mut().push(code.to_string());
        if code == injector::OVERLAY_OPEN_PROBE {
            return Ok(Value::Bool(self.overlay_visible.get()));
        }
        if code == injector::FORCE_CLEAR_OVERLAYS {
            if !self.force_clear_inert.get() {
                self.clear_overlays();
            }
            return Ok(Value::Bool(true));
        }
        Ok(Value::Null)
    }

    fn scroll_into_view(&self, handle_: &ElementHandle) -> Result<(), DriverError> {
        self.index(handle_).map(|_| ())
    }

    fn is_displayed(&self, handle_: &ElementHandle) -> Result<bool, DriverError> {
        let index = self.index(handle_)?;
        Ok(self.nodes.borrow()[index].spec.displayed)
    }

    fn is_enabled(&self, handle_: &ElementHandle) -> Result<bool, DriverError> {
        let index = self.index(handle_)?;
        Ok(self.nodes.borrow()[index].spec.enabled)
    }

    fn send_key(&self, handle_: &ElementHandle, key: &str) -> Result<(), DriverError> {
        let index = self.index(handle_)?;
        self.keys.borrow_mut().push((index, key.to_string()));
        Ok(())
    }

    fn text(&self, handle_: &ElementHandle) -> Result<String, DriverError> {
        let index = self.index(handle_)?;
        Ok(self.flat_text(index))
    }

    fn attr(&self, handle_: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        let index = self.index(handle_)?;
        Ok(self.attr_of(index, name))
    }
}

// --- selector parsing -------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Compound {
    scope: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Eq,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Comb {
    Descendant,
    Child,
}

fn split_list(selector: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in selector.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            ',' if !in_quote => {
                if !current.trim().is_empty() {
                    out.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn tokenize_complex(selector: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in selector.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '>' if !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(">".to_string());
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_complex(selector: &str) -> Vec<(Comb, Compound)> {
    let mut parts = Vec::new();
    let mut comb = Comb::Descendant;
    for token in tokenize_complex(selector) {
        if token == ">" {
            comb = Comb::Child;
            continue;
        }
        parts.push((comb, parse_compound(&token)));
        comb = Comb::Descendant;
    }
    parts
}

fn parse_compound(token: &str) -> Compound {
    let mut compound = Compound::default();
    if token == "*" {
        return compound;
    }
    if token == ":scope" {
        compound.scope = true;
        return compound;
    }
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;

    let mut tag = String::new();
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_') {
        tag.push(chars[i]);
        i += 1;
    }
    if !tag.is_empty() {
        compound.tag = Some(tag.to_lowercase());
    }

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let mut class = String::new();
                while i < chars.len() && (chars[i].is_alphanumeric() || "-_".contains(chars[i])) {
                    class.push(chars[i]);
                    i += 1;
                }
                compound.classes.push(class);
            }
            '#' => {
                i += 1;
                let mut id = String::new();
                while i < chars.len() && (chars[i].is_alphanumeric() || "-_".contains(chars[i])) {
                    id.push(chars[i]);
                    i += 1;
                }
                compound.id = Some(id);
            }
            '[' => {
                i += 1;
                let mut name = String::new();
                while i < chars.len() && chars[i] != '=' && chars[i] != '*' && chars[i] != ']' {
                    name.push(chars[i]);
                    i += 1;
                }
                let mut op = AttrOp::Eq;
                let mut value = String::new();
                if i < chars.len() && chars[i] == '*' {
                    op = AttrOp::Contains;
                    i += 1;
                }
                if i < chars.len() && chars[i] == '=' {
                    i += 1;
                    if i < chars.len() && chars[i] == '\'' {
                        i += 1;
                        while i < chars.len() && chars[i] != '\'' {
                            value.push(chars[i]);
                            i += 1;
                        }
                        if i < chars.len() {
                            i += 1; // closing quote
                        }
                    }
                } else {
                    // bare [attr] presence check
                    op = AttrOp::Contains;
                }
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i < chars.len() {
                    i += 1; // ']'
                }
                compound.attrs.push((name.trim().to_string(), op, value));
            }
            _ => i += 1,
        }
    }
    compound
}
