//! Pagination drive and checkpoint cadence.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;

use crate::config::Config;
use crate::driver::{click_with_fallback, Driver, ElementHandle, Query};
use crate::overlay::OverlayController;
use crate::records::ExtractionSession;
use crate::row::RowProcessor;
use crate::sink::RecordSink;
use crate::wait::wait_until;

const ROW_QUERY: &str = "table tbody tr";

/// Next-control shapes inside the pagination container, most common
/// first. Containers flagged disabled are skipped.
fn next_control_queries() -> [Query; 5] {
    [
        Query::css("a[rel='next']"),
        Query::css("li.next a"),
        Query::css("a[aria-label='Next']"),
        Query::css("a[aria-label='»']"),
        Query::xpath(
            ".//a[normalize-space(text())='Next' or normalize-space(text())='>' or normalize-space(text())='»']",
        ),
    ]
}

pub struct PageSession<'a> {
    driver: &'a dyn Driver,
    config: &'a Config,
    cancel: &'a AtomicBool,
}

impl<'a> PageSession<'a> {
    pub fn new(driver: &'a dyn Driver, config: &'a Config, cancel: &'a AtomicBool) -> Self {
        PageSession {
            driver,
            config,
            cancel,
        }
    }

    /// Run the crawl to its terminal state. Errors out of here are
    /// session-fatal; the caller still owns the final flush.
    pub fn run(
        &self,
        session: &mut ExtractionSession,
        sink: &mut dyn RecordSink,
    ) -> anyhow::Result<()> {
        let crawl = &self.config.crawl;
        self.driver
            .navigate(&crawl.base_url)
            .context("navigation to catalog failed")?;

        let mut overlay = OverlayController::new(self.driver, &self.config.timing);
        let processor = RowProcessor::new(self.driver, &self.config.timing);
        session.page = session.page.max(1);

        'crawl: loop {
            log::info!("Scraping page {}...", session.page);

            let Some(rows) = self.wait_for_rows() else {
                log::warn!("no rows found on page {}; ending crawl", session.page);
                break;
            };
            log::info!("Found {} rows on page {}", rows.len(), session.page);

            let cap = if crawl.test_mode {
                crawl.row_limit.min(rows.len())
            } else {
                rows.len()
            };

            for (index, row) in rows.iter().take(cap).enumerate() {
                if self.cancel.load(Ordering::SeqCst) {
                    log::warn!("cancellation requested; stopping before row {}", index + 1);
                    break 'crawl;
                }

                let before = session.detailed.len();
                if !processor.process(&mut overlay, session, row, index) {
                    log::warn!("row {} dropped; continuing", index + 1);
                }

                if checkpoint_due(
                    before,
                    session.detailed.len(),
                    self.config.output.checkpoint_every,
                ) {
                    log::info!(
                        "Checkpoint: flushing after {} detailed records",
                        session.detailed.len()
                    );
                    // A failed checkpoint is not fatal; the final flush
                    // still runs and the next checkpoint retries.
                    if let Err(e) = sink.flush(session) {
                        log::error!("checkpoint flush failed: {e:#}");
                    }
                }
            }

            log::info!(
                "Page {} complete - {} basic, {} detailed records",
                session.page,
                session.basic.len(),
                session.detailed.len()
            );

            if crawl.test_mode {
                log::info!("test mode: stopping after one page");
                break;
            }
            if session.page >= crawl.max_pages {
                log::warn!("page ceiling {} reached; stopping", crawl.max_pages);
                break;
            }
            if !self.next_page() {
                log::info!("no further pages");
                break;
            }
            session.page += 1;
        }
        Ok(())
    }

    fn wait_for_rows(&self) -> Option<Vec<ElementHandle>> {
        wait_until(
            self.config.timing.wait_timeout(),
            self.config.timing.poll_interval(),
            || {
                let rows = self
                    .driver
                    .find_all(&Query::css(ROW_QUERY))
                    .unwrap_or_default();
                (!rows.is_empty()).then_some(rows)
            },
        )
        .ok()
    }

    /// Activate the next page and wait for its rows. `false` is the
    /// terminal state: no pagination, no enabled control, or no rows
    /// after the switch.
    fn next_page(&self) -> bool {
        let Some(pagination) = self
            .driver
            .find_all(&Query::css(".pagination"))
            .unwrap_or_default()
            .into_iter()
            .next()
        else {
            log::info!("pagination container not present");
            return false;
        };

        let Some(next) = self.find_next_control(&pagination) else {
            log::info!("no enabled next control");
            return false;
        };

        let _ = self.driver.scroll_into_view(&next);
        std::thread::sleep(self.config.timing.settle());
        if let Err(e) = click_with_fallback(self.driver, &next) {
            log::warn!("next-page click failed: {e}");
            return false;
        }
        if self.wait_for_rows().is_none() {
            log::warn!("rows never appeared after pagination");
            return false;
        }
        log::info!("Navigated to next page");
        true
    }

    fn find_next_control(&self, pagination: &ElementHandle) -> Option<ElementHandle> {
        for query in next_control_queries() {
            for handle in self
                .driver
                .find_within(pagination, &query)
                .unwrap_or_default()
            {
                if self.inside_disabled_container(&handle) {
                    continue;
                }
                if self.driver.is_displayed(&handle).unwrap_or(false)
                    && self.driver.is_enabled(&handle).unwrap_or(false)
                {
                    return Some(handle);
                }
            }
        }
        None
    }

    fn inside_disabled_container(&self, handle: &ElementHandle) -> bool {
        self.driver
            .find_within(handle, &Query::xpath(".."))
            .unwrap_or_default()
            .first()
            .and_then(|parent| self.driver.attr(parent, "class").ok().flatten())
            .map(|class| class.to_lowercase().contains("disabled"))
            .unwrap_or(false)
    }
}

/// A checkpoint is due exactly when this row appended a detailed record
/// and the count landed on a positive multiple of `every`.
pub fn checkpoint_due(before: usize, after: usize, every: usize) -> bool {
    every > 0 && after > before && after > 0 && after % every == 0
}
