use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One untyped row as it came off the source file: column label -> raw cell.
///
/// Cells are kept as strings; coercion into typed fields happens in the
/// transform layer and is total (malformed cells degrade to defaults there).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(cells: BTreeMap<String, String>) -> Self {
        RawRow { cells }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RawRow {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Column lookup, case-insensitive on the label.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(column))
            .map(|(_, cell)| cell.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|cell| cell.trim().is_empty())
    }
}
