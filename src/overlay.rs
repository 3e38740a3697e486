//! Detail-overlay lifecycle.
//!
//! The overlay is global to the document, so its state machine is the
//! gate everything else runs behind: Closed -> Opening -> Open ->
//! Closing -> Closed. `close()` is idempotent; closing an already-closed
//! overlay succeeds trivially.

use crate::browser::injector;
use crate::config::TimingConfig;
use crate::driver::{click_with_fallback, Driver, ElementHandle, Query};
use crate::error::ScrapeError;
use crate::wait::wait_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Overlay queries in match order; shape varies with the UI code path.
fn overlay_queries() -> [Query; 5] {
    [
        Query::css(".modal.show"),
        Query::css(".modal.fade.show"),
        Query::css(".modal.in"),
        Query::css(".modal[style*='display: block']"),
        Query::css("[role='dialog']"),
    ]
}

const CLOSE_CONTROLS: &str =
    ".modal .close, .modal button[data-dismiss='modal'], .modal .btn-close, .modal button[aria-label='Close']";

pub struct OverlayController<'a> {
    driver: &'a dyn Driver,
    timing: &'a TimingConfig,
    state: OverlayState,
}

impl<'a> OverlayController<'a> {
    pub fn new(driver: &'a dyn Driver, timing: &'a TimingConfig) -> Self {
        OverlayController {
            driver,
            timing,
            state: OverlayState::Closed,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Invoke the trigger and wait for a displayed overlay. On timeout
    /// the controller returns to Closed and reports `OverlayNotFound`.
    pub fn open(&mut self, trigger: &ElementHandle) -> Result<ElementHandle, ScrapeError> {
        click_with_fallback(self.driver, trigger)?;
        self.state = OverlayState::Opening;

        let found = wait_until(
            self.timing.wait_timeout(),
            self.timing.poll_interval(),
            || self.displayed_overlay(),
        );
        match found {
            Ok(handle) => {
                self.state = OverlayState::Open;
                Ok(handle)
            }
            Err(_) => {
                self.state = OverlayState::Closed;
                Err(ScrapeError::OverlayNotFound)
            }
        }
    }

    /// Close whatever overlay is showing. Escalates: programmatic
    /// force-clear, then a close control, then the dismiss key, verifying
    /// invisibility after each. All exhausted is `OverlayCloseFailed`;
    /// the next row's defensive close retries.
    pub fn close(&mut self) -> Result<(), ScrapeError> {
        if !self.overlay_visible() {
            self.state = OverlayState::Closed;
            return Ok(());
        }
        self.state = OverlayState::Closing;

        if self.driver.run_script(injector::FORCE_CLEAR_OVERLAYS).is_ok()
            && self.verify_invisible()
        {
            self.state = OverlayState::Closed;
            return Ok(());
        }
        log::warn!("overlay survived programmatic reset, trying close control");

        if let Some(control) = self.close_control() {
            if self.driver.click_via_script(&control).is_ok() && self.verify_invisible() {
                self.state = OverlayState::Closed;
                return Ok(());
            }
        }
        log::warn!("overlay survived close control, trying dismiss key");

        if let Some(body) = self
            .driver
            .find_all(&Query::css("body"))
            .unwrap_or_default()
            .into_iter()
            .next()
        {
            if self.driver.send_key(&body, "Escape").is_ok() && self.verify_invisible() {
                self.state = OverlayState::Closed;
                return Ok(());
            }
        }

        self.state = OverlayState::Open;
        Err(ScrapeError::OverlayCloseFailed)
    }

    fn displayed_overlay(&self) -> Option<ElementHandle> {
        for query in overlay_queries() {
            for handle in self.driver.find_all(&query).unwrap_or_default() {
                if self.driver.is_displayed(&handle).unwrap_or(false) {
                    return Some(handle);
                }
            }
        }
        // Generic detection for overlays that match none of the usual shapes.
        self.driver
            .find_all(&Query::css(".modal"))
            .unwrap_or_default()
            .into_iter()
            .find(|handle| self.driver.is_displayed(handle).unwrap_or(false))
    }

    fn overlay_visible(&self) -> bool {
        match self.driver.run_script(injector::OVERLAY_OPEN_PROBE) {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(_) => self.displayed_overlay().is_some(),
        }
    }

    fn close_control(&self) -> Option<ElementHandle> {
        self.driver
            .find_all(&Query::css(CLOSE_CONTROLS))
            .unwrap_or_default()
            .into_iter()
            .find(|handle| self.driver.is_displayed(handle).unwrap_or(false))
    }

    fn verify_invisible(&self) -> bool {
        wait_until(
            self.timing.wait_timeout(),
            self.timing.poll_interval(),
            || (!self.overlay_visible()).then_some(()),
        )
        .is_ok()
    }
}
