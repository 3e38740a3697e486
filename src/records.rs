//! Record types accumulated over a crawl, and the column-name rules that
//! turn `(panel, nutrient label)` into a stable CSV column.

use std::collections::BTreeMap;

/// Header row of the basic table, in cell order.
pub const BASIC_HEADERS: [&str; 6] = [
    "Food_ID",
    "Food_name_and_Description",
    "Scientific_name",
    "Alternate_Common_names",
    "Edible_portion",
    "Option",
];

/// Minimum number of row cells required to build a [`BasicRecord`].
pub const MIN_BASIC_CELLS: usize = 6;

/// Identity fields of one catalog row, captured verbatim at row-visit time.
/// Created exactly once per row, regardless of downstream overlay success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicRecord {
    pub food_id: String,
    pub name: String,
    pub scientific_name: String,
    pub alternate_names: String,
    pub edible_portion: String,
    pub option: String,
}

impl BasicRecord {
    /// Build from row cell texts. Fewer than [`MIN_BASIC_CELLS`] cells
    /// means the row cannot be identified and nothing is recorded.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        if cells.len() < MIN_BASIC_CELLS {
            return None;
        }
        Some(BasicRecord {
            food_id: cells[0].trim().to_string(),
            name: cells[1].trim().to_string(),
            scientific_name: cells[2].trim().to_string(),
            alternate_names: cells[3].trim().to_string(),
            edible_portion: cells[4].trim().to_string(),
            option: cells[5].trim().to_string(),
        })
    }

    /// Field values in [`BASIC_HEADERS`] order.
    pub fn fields(&self) -> [&str; 6] {
        [
            &self.food_id,
            &self.name,
            &self.scientific_name,
            &self.alternate_names,
            &self.edible_portion,
            &self.option,
        ]
    }
}

/// A basic record plus every nutrient column harvested across panels.
/// Appended to the session at most once per row, after all panels were
/// attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedRecord {
    pub basic: BasicRecord,
    pub nutrients: BTreeMap<String, String>,
}

impl DetailedRecord {
    pub fn new(basic: BasicRecord) -> Self {
        DetailedRecord {
            basic,
            nutrients: BTreeMap::new(),
        }
    }

    /// Merge one panel's harvest. Panel prefixes keep columns from
    /// different panels disjoint; a repeated column within the same panel
    /// is last-write-wins.
    pub fn merge(&mut self, columns: BTreeMap<String, String>) {
        self.nutrients.extend(columns);
    }
}

/// Everything accumulated over one crawl invocation. Owned by the crawl
/// entry point, mutated only by appends, flushed at checkpoints and at
/// the end.
#[derive(Debug, Default)]
pub struct ExtractionSession {
    pub basic: Vec<BasicRecord>,
    pub detailed: Vec<DetailedRecord>,
    pub page: u32,
}

/// Normalize a nutrient label into column-name form: spaces to
/// underscores, `&` to `and`, slash and hyphen to underscores,
/// parentheses/commas/colons/periods/brackets dropped, then outer
/// underscores trimmed. Idempotent.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            ' ' => out.push('_'),
            ',' | '(' | ')' | ':' | '.' | '[' | ']' => {}
            '&' => out.push_str("and"),
            '-' | '/' => out.push('_'),
            other => out.push(other),
        }
    }
    out.trim_matches('_').to_string()
}

/// Full column name for a nutrient: panel prefix plus normalized label.
pub fn column_name(panel: &str, label: &str) -> String {
    format!("{}_{}", panel.replace(' ', "_"), normalize_label(label))
}
