use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::config::Config as AppConfig;

pub fn init(config: &AppConfig) -> anyhow::Result<()> {
    // Ensure log directory exists
    let log_dir = Path::new(&config.output.log_dir);
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let log_file = File::create(log_dir.join("harvest.log"))?;

    let level = if config.crawl.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(level, Config::default(), log_file),
    ])?;

    Ok(())
}
