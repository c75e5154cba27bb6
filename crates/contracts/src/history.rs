//! History & Catalog - correlator output
//!
//! `History` holds the elapsed-time samples per point/interval id.
//! `Catalog` maps every id that may appear in a history to its display name and kind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Synthetic point recorded when a measurement window opens
pub const POWER_ON: &str = "power_on";

/// Synthetic point recorded when a counted measurement window closes
pub const POWER_OFF: &str = "power_off";

/// Whether an id is one of the two synthetic power points
pub fn is_synthetic(id: &str) -> bool {
    id == POWER_ON || id == POWER_OFF
}

/// Append-only sample series, keyed by id, in first-insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    order: Vec<String>,
    series: HashMap<String, Vec<f64>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples recorded for `id` (0 if never seen)
    pub fn len_of(&self, id: &str) -> usize {
        self.series.get(id).map(Vec::len).unwrap_or(0)
    }

    /// Append one sample
    pub fn push(&mut self, id: &str, value: f64) {
        match self.series.get_mut(id) {
            Some(samples) => samples.push(value),
            None => {
                self.order.push(id.to_string());
                self.series.insert(id.to_string(), vec![value]);
            }
        }
    }

    /// All samples for `id`
    pub fn samples(&self, id: &str) -> &[f64] {
        self.series.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove the most recent sample for `id`; an emptied series is forgotten
    pub fn pop(&mut self, id: &str) -> Option<f64> {
        let samples = self.series.get_mut(id)?;
        let value = samples.pop();
        if samples.is_empty() {
            self.series.remove(id);
            self.order.retain(|o| o != id);
        }
        value
    }

    /// Most recent sample for `id`
    pub fn last(&self, id: &str) -> Option<f64> {
        self.series.get(id).and_then(|s| s.last().copied())
    }

    /// Iterate `(id, samples)` in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.order
            .iter()
            .map(move |id| (id.as_str(), self.samples(id)))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Kind of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Trigger point (including synthetic and suffixed duplicates)
    Point,
    /// Derived interval
    Interval,
}

/// Display metadata for one id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
}

/// Id → display metadata, in registration order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an id; re-registering an existing id is a no-op
    pub fn register(&mut self, id: &str, name: &str, kind: EntryKind) {
        if self.index.contains_key(id) {
            return;
        }
        self.index.insert(id.to_string(), self.entries.len());
        self.entries.push(CatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
            kind,
        });
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Display name, falling back to the id itself
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|e| e.name.as_str()).unwrap_or(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Width of the longest display name, for table alignment
    pub fn max_name_len(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.name.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Default display name for an id: underscores become spaces
pub fn display_name(id: &str) -> String {
    id.replace('_', " ")
}
