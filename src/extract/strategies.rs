//! The four canonical harvesting strategies, in priority order.

use std::sync::OnceLock;

use regex::Regex;

use super::Strategy;
use crate::driver::{Driver, ElementHandle, Query};
use crate::error::DriverError;

/// Text longer than this is container text, not a nutrient line.
const LOOSE_TEXT_CEILING: usize = 100;
const SCAN_TEXT_CEILING: usize = 200;

/// Item elements carrying two or more directly nested sub-elements:
/// the first is the label, the second the value.
pub struct PairedBlockStrategy;

impl Strategy for PairedBlockStrategy {
    fn name(&self) -> &'static str {
        "paired-block"
    }

    fn harvest(
        &self,
        driver: &dyn Driver,
        pane: &ElementHandle,
    ) -> Result<Vec<(String, String)>, DriverError> {
        let items = driver.find_within(pane, &Query::css(".list-group-item, .data-row, li"))?;
        let mut pairs = Vec::new();
        for item in &items {
            let subs = match driver.find_within(item, &Query::css(":scope > div, :scope > span")) {
                Ok(subs) => subs,
                Err(_) => continue,
            };
            if subs.len() < 2 {
                continue;
            }
            let (Ok(label), Ok(value)) = (driver.text(&subs[0]), driver.text(&subs[1])) else {
                continue;
            };
            pairs.push((label, value));
        }
        Ok(pairs)
    }
}

/// Row/cell structures of visible tables: first cell label, second value.
pub struct TabularStrategy;

impl Strategy for TabularStrategy {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn harvest(
        &self,
        driver: &dyn Driver,
        pane: &ElementHandle,
    ) -> Result<Vec<(String, String)>, DriverError> {
        let tables = driver.find_within(pane, &Query::css("table"))?;
        let mut pairs = Vec::new();
        for table in &tables {
            if !driver.is_displayed(table).unwrap_or(false) {
                continue;
            }
            let rows = match driver.find_within(table, &Query::css("tr")) {
                Ok(rows) => rows,
                Err(_) => continue,
            };
            for row in &rows {
                let cells = match driver.find_within(row, &Query::css("td")) {
                    Ok(cells) => cells,
                    Err(_) => continue,
                };
                if cells.len() < 2 {
                    continue;
                }
                let (Ok(label), Ok(value)) = (driver.text(&cells[0]), driver.text(&cells[1]))
                else {
                    continue;
                };
                pairs.push((label, value));
            }
        }
        Ok(pairs)
    }
}

/// Elements whose flattened text carries a colon: split once on the first
/// colon into label and value.
pub struct LooseTextPairStrategy;

impl Strategy for LooseTextPairStrategy {
    fn name(&self) -> &'static str {
        "loose-text-pair"
    }

    fn harvest(
        &self,
        driver: &dyn Driver,
        pane: &ElementHandle,
    ) -> Result<Vec<(String, String)>, DriverError> {
        let elements = driver.find_within(pane, &Query::css("div, p, li"))?;
        let mut pairs = Vec::new();
        for element in &elements {
            let Ok(text) = driver.text(element) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() || text.len() > LOOSE_TEXT_CEILING {
                continue;
            }
            if let Some((label, value)) = text.split_once(':') {
                pairs.push((label.trim().to_string(), value.trim().to_string()));
            }
        }
        Ok(pairs)
    }
}

/// Last resort: walk visible descendant text, line by line, trying the
/// separators `:`, tab, double-space, and keep only pairs that look like
/// nutrient data rather than UI chrome.
pub struct HeuristicScanStrategy;

impl Strategy for HeuristicScanStrategy {
    fn name(&self) -> &'static str {
        "heuristic-scan"
    }

    fn harvest(
        &self,
        driver: &dyn Driver,
        pane: &ElementHandle,
    ) -> Result<Vec<(String, String)>, DriverError> {
        let elements = driver.find_within(pane, &Query::css("*"))?;
        let mut pairs = Vec::new();
        for element in &elements {
            if !driver.is_displayed(element).unwrap_or(false) {
                continue;
            }
            let Ok(text) = driver.text(element) else {
                continue;
            };
            if text.is_empty() || text.len() > SCAN_TEXT_CEILING {
                continue;
            }
            for line in text.lines() {
                if let Some(pair) = parse_heuristic_line(line) {
                    pairs.push(pair);
                }
            }
        }
        Ok(pairs)
    }
}

/// One scan line to a candidate pair, or nothing. The label must be
/// 3–49 characters; the value needs a digit and a unit-like token, which
/// rejects navigation text and other chrome.
pub(crate) fn parse_heuristic_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    for separator in [":", "\t", "  "] {
        let Some((left, right)) = line.split_once(separator) else {
            continue;
        };
        let label = left.trim();
        let value = right.trim();
        if label_plausible(label) && value_plausible(value) {
            return Some((label.to_string(), value.to_string()));
        }
    }
    None
}

fn label_plausible(label: &str) -> bool {
    (3..=49).contains(&label.chars().count())
}

fn value_plausible(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit()) && unit_pattern().is_match(value)
}

/// Mass, energy, percent and trace markers. Word-bounded so that e.g.
/// "grams of" does not pass as a unit.
fn unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(g|mg|ug|µg|mcg|kcal|kj|iu|tr)\b|%").expect("unit pattern is valid")
    })
}
