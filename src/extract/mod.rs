//! Multi-strategy field harvesting.
//!
//! A [`Strategy`] is one self-contained algorithm for pulling label/value
//! pairs out of the active panel's subtree. The [`FieldExtractor`] holds
//! them in a fixed priority order and returns the first non-empty result;
//! later strategies are never consulted once one succeeds.

mod strategies;

pub use strategies::{
    HeuristicScanStrategy, LooseTextPairStrategy, PairedBlockStrategy, TabularStrategy,
};

use std::collections::BTreeMap;

use crate::driver::{Driver, ElementHandle};
use crate::error::DriverError;
use crate::records::column_name;

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Harvest raw `(label, value)` pairs from the pane subtree. A
    /// strategy tolerates missing or extra structure; an internal failure
    /// surfaces as an error here and is contained by the chain.
    fn harvest(
        &self,
        driver: &dyn Driver,
        pane: &ElementHandle,
    ) -> Result<Vec<(String, String)>, DriverError>;
}

pub struct FieldExtractor {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    /// The canonical chain, in priority order.
    pub fn new() -> Self {
        FieldExtractor {
            strategies: vec![
                Box::new(PairedBlockStrategy),
                Box::new(TabularStrategy),
                Box::new(LooseTextPairStrategy),
                Box::new(HeuristicScanStrategy),
            ],
        }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Self {
        FieldExtractor { strategies }
    }

    /// Column → value mapping for one panel, from the first strategy that
    /// yields anything. Never fails: a panel nothing works on is an empty
    /// mapping.
    pub fn extract(
        &self,
        driver: &dyn Driver,
        panel: &str,
        pane: &ElementHandle,
    ) -> BTreeMap<String, String> {
        for strategy in &self.strategies {
            match strategy.harvest(driver, pane) {
                Ok(pairs) => {
                    let columns = finalize(panel, pairs);
                    if !columns.is_empty() {
                        log::debug!(
                            "panel {panel:?}: {} fields via {}",
                            columns.len(),
                            strategy.name()
                        );
                        return columns;
                    }
                }
                Err(e) => {
                    log::debug!("panel {panel:?}: strategy {} failed: {e}", strategy.name());
                }
            }
        }
        log::warn!("panel {panel:?}: no strategy produced fields");
        BTreeMap::new()
    }
}

/// Prefix, normalize and de-blank one strategy's raw pairs. Within a
/// panel a repeated label is last-write-wins.
fn finalize(panel: &str, pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    let mut columns = BTreeMap::new();
    for (label, value) in pairs {
        let label = label.trim();
        let value = value.trim();
        if label.is_empty() || value.is_empty() {
            continue;
        }
        columns.insert(column_name(panel, label), value.to_string());
    }
    columns
}
