use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Bounded run: one page, `row_limit` rows. For selector maintenance.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
    /// Safety ceiling against a pagination loop that never terminates.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub debug: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headless: true,
            test_mode: false,
            row_limit: default_row_limit(),
            max_pages: default_max_pages(),
            debug: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Settling buffer used only where no observable predicate exists.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_click_attempts")]
    pub click_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            click_attempts: default_click_attempts(),
        }
    }
}

impl TimingConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_basic_csv")]
    pub basic_csv: String,
    #[serde(default = "default_detailed_csv")]
    pub detailed_csv: String,
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            basic_csv: default_basic_csv(),
            detailed_csv: default_detailed_csv(),
            checkpoint_every: default_checkpoint_every(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_base_url() -> String {
    "https://i.fnri.dost.gov.ph/fct/library/food_content/".to_string()
}
fn default_true() -> bool {
    true
}
fn default_row_limit() -> usize {
    2
}
fn default_max_pages() -> u32 {
    500
}
fn default_wait_timeout_ms() -> u64 {
    20_000
}
fn default_poll_interval_ms() -> u64 {
    250
}
fn default_settle_ms() -> u64 {
    500
}
fn default_click_attempts() -> u32 {
    3
}
fn default_basic_csv() -> String {
    "fct_basic_food_data.csv".to_string()
}
fn default_detailed_csv() -> String {
    "fct_detailed_nutritional_data.csv".to_string()
}
fn default_checkpoint_every() -> usize {
    10
}
fn default_log_dir() -> String {
    "data/logs".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path();

        let content = fs::read_to_string(&config_path)
            .context(format!("Failed to read config.toml at {config_path:?}"))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config.toml")?;
        config.validate()?;

        Ok(config)
    }

    /// Missing config file is not an error; defaults cover a full crawl.
    pub fn load_or_default() -> Result<Self> {
        if !get_config_path().exists() {
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load()
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.crawl.base_url)
            .context(format!("Invalid base_url: {}", self.crawl.base_url))?;
        Ok(())
    }

    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&config_path, content).context("Failed to write config.toml")?;

        Ok(())
    }
}

pub fn get_config_path() -> PathBuf {
    PathBuf::from("config").join("config.toml")
}
