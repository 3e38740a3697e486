//! Panel activation inside the open overlay.
//!
//! A panel that cannot be activated is unavailable, not an error: the
//! row keeps whatever the other panels yield.

use crate::config::TimingConfig;
use crate::driver::{click_with_fallback, first_interactable, Driver, ElementHandle, Query};
use crate::wait::wait_until;

const XPATH_LOWERCASE: &str =
    "translate(normalize-space(.), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz')";

/// Every activator shape seen for these panels, in lookup order: exact
/// case-insensitive text on tab activators, looser ancestor-based text
/// matches, then an identifier derived from the panel name.
pub fn activator_queries(panel: &str) -> Vec<Query> {
    let lower = panel.to_lowercase();
    let exact = format!("{XPATH_LOWERCASE} = '{lower}'");
    let loose = format!("contains({XPATH_LOWERCASE}, '{lower}')");
    let ident = lower.replace(' ', "");
    vec![
        Query::xpath(format!("//a[@data-toggle='tab' and {exact}]")),
        Query::xpath(format!("//button[@data-toggle='tab' and {exact}]")),
        Query::xpath(format!("//li/a[{loose}]")),
        Query::xpath(format!("//span[{loose}]/ancestor::a")),
        Query::css(format!(
            "a[href='#{ident}'], a[data-target='#{ident}'], button[data-target='#{ident}']"
        )),
    ]
}

/// Fallback query for the pane when the activator exposes no target id.
pub const ACTIVE_PANE: &str = ".tab-pane.active, .tab-content > .active";

const ALL_ACTIVATORS: &str = ".nav-link, .tab-link, a[data-toggle='tab'], button[data-toggle='tab']";

pub struct PanelNavigator<'a> {
    driver: &'a dyn Driver,
    timing: &'a TimingConfig,
}

impl<'a> PanelNavigator<'a> {
    pub fn new(driver: &'a dyn Driver, timing: &'a TimingConfig) -> Self {
        PanelNavigator { driver, timing }
    }

    /// Activate `panel` inside the overlay and return the visible pane,
    /// or `None` when the panel is unavailable.
    pub fn activate(&self, overlay: &ElementHandle, panel: &str) -> Option<ElementHandle> {
        let activator = self.find_activator(overlay, panel)?;

        let _ = self.driver.scroll_into_view(&activator);
        if let Err(e) = click_with_fallback(self.driver, &activator) {
            log::warn!("panel {panel:?}: activation click failed: {e}");
            return None;
        }
        self.wait_for_pane(&activator, panel)
    }

    fn find_activator(&self, overlay: &ElementHandle, panel: &str) -> Option<ElementHandle> {
        for query in activator_queries(panel) {
            let handles = match &query {
                Query::XPath(_) => self.driver.find_all(&query).unwrap_or_default(),
                Query::Css(_) => self.driver.find_within(overlay, &query).unwrap_or_default(),
            };
            if let Some(found) = first_interactable(self.driver, &handles) {
                log::debug!("panel {panel:?}: activator via {query}");
                return Some(found);
            }
        }

        // List what is actually there, to keep the selector ladder honest.
        let visible: Vec<String> = self
            .driver
            .find_within(overlay, &Query::css(ALL_ACTIVATORS))
            .unwrap_or_default()
            .iter()
            .filter_map(|h| self.driver.text(h).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        log::warn!("panel {panel:?}: no activator found; visible tabs: {visible:?}");
        None
    }

    fn wait_for_pane(&self, activator: &ElementHandle, panel: &str) -> Option<ElementHandle> {
        let query = match self.pane_id(activator) {
            Some(id) => Query::css(format!("#{id}")),
            None => Query::css(ACTIVE_PANE),
        };
        let pane = wait_until(
            self.timing.wait_timeout(),
            self.timing.poll_interval(),
            || {
                self.driver
                    .find_all(&query)
                    .unwrap_or_default()
                    .into_iter()
                    .find(|h| self.driver.is_displayed(h).unwrap_or(false))
            },
        );
        match pane {
            Ok(pane) => Some(pane),
            Err(_) => {
                log::warn!("panel {panel:?}: pane never became visible ({query})");
                None
            }
        }
    }

    /// Content-region id from the activator's `href` fragment or
    /// `data-target`, when it exposes one.
    fn pane_id(&self, activator: &ElementHandle) -> Option<String> {
        if let Ok(Some(href)) = self.driver.attr(activator, "href") {
            if let Some((_, fragment)) = href.split_once('#') {
                if !fragment.is_empty() {
                    return Some(fragment.to_string());
                }
            }
        }
        if let Ok(Some(target)) = self.driver.attr(activator, "data-target") {
            let target = target.trim_start_matches('#');
            if !target.is_empty() {
                return Some(target.to_string());
            }
        }
        None
    }
}
