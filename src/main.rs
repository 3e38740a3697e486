use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fct_harvester::{logger, run_crawl, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load Configuration
    println!("[*] Loading FCT Harvester...");
    let config = match Config::load_or_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[!] Configuration Error: {}", e);
            return Err(e);
        }
    };

    logger::init(&config)?;

    println!("[*] Target catalog: {}", config.crawl.base_url);
    println!(
        "[*] Mode: {}",
        if config.crawl.test_mode {
            "test (bounded)"
        } else {
            "full crawl"
        }
    );

    // 2. Ctrl-C sets the cancel flag; the session stops between rows and
    // the final flush still runs.
    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received; finishing current row and flushing...");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };

    // 3. The crawl itself is blocking by design: the overlay is global to
    // the document, so there is nothing to parallelize.
    let result = tokio::task::spawn_blocking(move || run_crawl(config, cancel)).await?;
    watcher.abort();
    result
}
