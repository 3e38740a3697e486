//! Per-row orchestration: basic capture, overlay open, panel iteration,
//! guaranteed close.
//!
//! Containment rule: nothing that happens after the basic record is
//! appended may take that record away. Every detail-phase failure
//! degrades the row, never the session.

use std::cell::{Cell, RefCell};

use crate::config::TimingConfig;
use crate::driver::{first_interactable, Driver, ElementHandle, Query};
use crate::error::{DriverError, ScrapeError};
use crate::extract::FieldExtractor;
use crate::overlay::OverlayController;
use crate::panel::PanelNavigator;
use crate::records::{BasicRecord, DetailedRecord, ExtractionSession};
use crate::wait::{wait_until, with_retries, Recovery};

/// The fixed panel list, in visit order.
pub const PANELS: [&str; 5] = [
    "Proximates",
    "Other Carbohydrate",
    "Minerals",
    "Vitamins",
    "Lipids",
];

/// Detail-trigger shapes, most specific first; the row's name-cell link
/// is the fallback after these.
const TRIGGER_QUERIES: [&str; 9] = [
    "a[data-toggle='modal']",
    "button[data-toggle='modal']",
    "a[href*='#modal']",
    "a[href*='detail']",
    ".btn-info",
    ".btn-primary",
    ".btn-sm",
    "a[onclick*='modal']",
    "button[onclick*='modal']",
];

/// Stable-key lookup for a row: handles never survive an overlay
/// boundary, the food id does.
pub fn row_by_food_id(food_id: &str) -> Query {
    Query::xpath(format!(
        "//td[normalize-space(text())='{food_id}']/ancestor::tr"
    ))
}

pub struct RowProcessor<'a> {
    driver: &'a dyn Driver,
    timing: &'a TimingConfig,
    navigator: PanelNavigator<'a>,
    extractor: FieldExtractor,
    surveyed: Cell<bool>,
}

impl<'a> RowProcessor<'a> {
    pub fn new(driver: &'a dyn Driver, timing: &'a TimingConfig) -> Self {
        RowProcessor {
            driver,
            timing,
            navigator: PanelNavigator::new(driver, timing),
            extractor: FieldExtractor::new(),
            surveyed: Cell::new(false),
        }
    }

    /// Process one catalog row. `false` means the row was dropped
    /// entirely (no basic record); any other outcome keeps at least the
    /// basic data and returns `true`.
    pub fn process(
        &self,
        overlay: &mut OverlayController<'_>,
        session: &mut ExtractionSession,
        row: &ElementHandle,
        index: usize,
    ) -> bool {
        let Some(basic) = self.capture_basic(row) else {
            log::warn!("row {}: {}", index + 1, ScrapeError::RowExtractionFailed);
            return false;
        };
        // Recorded before anything can go wrong downstream.
        session.basic.push(basic.clone());
        log::info!("Processing row {}: {}...", index + 1, snippet(&basic.name, 50));

        if let Err(e) = overlay.close() {
            log::warn!("row {}: defensive close failed: {e}", index + 1);
        }
        std::thread::sleep(self.timing.settle());

        // The handle from the page scan predates the defensive close;
        // re-acquire by food id before touching the row again.
        let Some(row) = self.reacquire_row(&basic.food_id) else {
            log::warn!(
                "could not re-find row for food id {}; keeping basic data only",
                basic.food_id
            );
            return true;
        };

        let Some(trigger) = self.find_trigger(&row) else {
            log::info!(
                "row {}: {}; keeping basic data only",
                index + 1,
                ScrapeError::TriggerNotFound
            );
            return true;
        };
        let _ = self.driver.scroll_into_view(&trigger);

        let Some(overlay_root) = self.open_overlay(overlay, &basic.food_id, trigger) else {
            return true;
        };

        let detailed = self.extract_details(&overlay_root, basic);
        if let Err(e) = overlay.close() {
            log::warn!("row {}: {e}", index + 1);
        }
        log::info!(
            "row {}: {} nutrient fields harvested",
            index + 1,
            detailed.nutrients.len()
        );
        session.detailed.push(detailed);

        std::thread::sleep(self.timing.settle());
        true
    }

    fn capture_basic(&self, row: &ElementHandle) -> Option<BasicRecord> {
        let cells = self.driver.find_within(row, &Query::css("td")).ok()?;
        let mut texts = Vec::with_capacity(cells.len());
        for cell in &cells {
            texts.push(self.driver.text(cell).ok()?);
        }
        BasicRecord::from_cells(&texts)
    }

    fn reacquire_row(&self, food_id: &str) -> Option<ElementHandle> {
        let query = row_by_food_id(food_id);
        wait_until(
            self.timing.wait_timeout(),
            self.timing.poll_interval(),
            || {
                self.driver
                    .find_all(&query)
                    .unwrap_or_default()
                    .into_iter()
                    .next()
            },
        )
        .ok()
    }

    fn find_trigger(&self, row: &ElementHandle) -> Option<ElementHandle> {
        for selector in TRIGGER_QUERIES {
            let handles = self
                .driver
                .find_within(row, &Query::css(selector))
                .unwrap_or_default();
            if let Some(found) = first_interactable(self.driver, &handles) {
                log::debug!("trigger via {selector:?}");
                return Some(found);
            }
        }

        // Fall back to the name-cell hyperlink.
        let cells = self
            .driver
            .find_within(row, &Query::css("td"))
            .unwrap_or_default();
        if cells.len() > 1 {
            let links = self
                .driver
                .find_within(&cells[1], &Query::css("a"))
                .unwrap_or_default();
            if let Some(link) = links
                .into_iter()
                .find(|h| self.driver.is_displayed(h).unwrap_or(false))
            {
                log::debug!("trigger via name-cell link");
                return Some(link);
            }
        }
        None
    }

    /// Open the overlay with bounded click attempts. Staleness re-acquires
    /// row and trigger by food id; an overlay that never appears is given
    /// up on immediately.
    fn open_overlay(
        &self,
        overlay: &mut OverlayController<'_>,
        food_id: &str,
        trigger: ElementHandle,
    ) -> Option<ElementHandle> {
        let trigger = RefCell::new(trigger);
        let opened = with_retries(
            self.timing.click_attempts,
            |_| overlay.open(&trigger.borrow()),
            |err, attempt| match err {
                ScrapeError::Driver(DriverError::Stale) => {
                    log::warn!("stale trigger on attempt {attempt}, re-acquiring row {food_id}");
                    match self
                        .reacquire_row(food_id)
                        .and_then(|row| self.find_trigger(&row))
                    {
                        Some(fresh) => {
                            *trigger.borrow_mut() = fresh;
                            Recovery::Retry
                        }
                        None => Recovery::GiveUp,
                    }
                }
                ScrapeError::OverlayNotFound => Recovery::GiveUp,
                _ => Recovery::Retry,
            },
        );
        match opened {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("row {food_id}: detail phase abandoned: {e}");
                None
            }
        }
    }

    /// Visit every panel and merge the harvest. Panel prefixes keep the
    /// merge collision-free across panels; the record is returned even
    /// when every panel came up empty.
    fn extract_details(&self, overlay_root: &ElementHandle, basic: BasicRecord) -> DetailedRecord {
        if !self.surveyed.get() {
            self.surveyed.set(true);
            self.survey(overlay_root);
        }

        let mut detailed = DetailedRecord::new(basic);
        for panel in PANELS {
            match self.navigator.activate(overlay_root, panel) {
                Some(pane) => {
                    let columns = self.extractor.extract(self.driver, panel, &pane);
                    log::info!("panel {panel:?}: {} fields", columns.len());
                    detailed.merge(columns);
                }
                None => log::info!("{}", ScrapeError::PanelUnavailable(panel.to_string())),
            }
        }
        detailed
    }

    /// One-time structural survey of the first overlay. Operability aid
    /// only; nothing downstream depends on it.
    fn survey(&self, overlay_root: &ElementHandle) {
        log::info!("--- overlay structure survey (first row) ---");

        let activators = self
            .driver
            .find_within(
                overlay_root,
                &Query::css("a[data-toggle='tab'], button[data-toggle='tab'], .nav-link, .tab-link"),
            )
            .unwrap_or_default();
        log::info!("{} tab activators", activators.len());
        for activator in &activators {
            let text = self.driver.text(activator).unwrap_or_default();
            let target = self
                .driver
                .attr(activator, "data-target")
                .ok()
                .flatten()
                .or_else(|| self.driver.attr(activator, "href").ok().flatten());
            log::info!("  tab {:?} -> {:?}", text.trim(), target);
        }

        let regions = self
            .driver
            .find_within(
                overlay_root,
                &Query::css(".tab-pane, .tab-content > div, .modal-body"),
            )
            .unwrap_or_default();
        log::info!("{} content regions", regions.len());

        let data = self
            .driver
            .find_within(overlay_root, &Query::css(".list-group-item, tr, dt, dd"))
            .unwrap_or_default();
        log::info!("{} candidate data elements", data.len());
        for (i, element) in data.iter().take(5).enumerate() {
            if let Ok(text) = self.driver.text(element) {
                log::info!("  sample {}: {}", i + 1, snippet(&text, 100));
            }
        }
        log::info!("--- end survey ---");
    }
}

fn snippet(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
