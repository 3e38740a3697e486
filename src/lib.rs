//! Resilient interactive extraction engine for a JavaScript-rendered,
//! paginated nutritional catalog.
//!
//! The engine is a single logical thread of control: the page session
//! walks rows, each row opens the detail overlay, switches through its
//! panels and harvests nutrient fields through a fallback strategy
//! chain, and the accumulated session is checkpointed to CSV so a
//! multi-hour crawl survives interruption.

pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod logger;
pub mod overlay;
pub mod panel;
pub mod records;
pub mod row;
pub mod session;
pub mod sink;
pub mod wait;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use config::Config;

use records::ExtractionSession;
use sink::RecordSink;

/// Run one full crawl: launch the browser, walk every page, and flush
/// whatever was accumulated, on success and session failure alike.
pub fn run_crawl(config: Config, cancel: Arc<AtomicBool>) -> anyhow::Result<()> {
    let driver = browser::ChromeDriver::launch(config.crawl.headless)?;
    let mut sink = sink::CsvSink::new(&config.output);
    let mut session = ExtractionSession::default();

    let outcome = session::PageSession::new(&driver, &config, &cancel).run(&mut session, &mut sink);
    if let Err(e) = &outcome {
        log::error!("Crawl failed: {e:#}");
    }

    match sink.flush(&session) {
        Ok(()) => log::info!(
            "Final flush complete: {} basic, {} detailed records",
            session.basic.len(),
            session.detailed.len()
        ),
        Err(e) => log::error!("Final flush failed: {e:#}"),
    }
    outcome
}
