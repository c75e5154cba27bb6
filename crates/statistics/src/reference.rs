//! Reference snapshots
//!
//! A reference file is a JSON object keyed by id. When the file is absent the
//! current summaries are written to it; otherwise the run is compared against it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use contracts::is_synthetic;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StatisticsError};
use crate::summary::StatSummary;

/// Stored summaries, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSnapshot(BTreeMap<String, StatSummary>);

impl ReferenceSnapshot {
    pub fn from_summaries(summaries: &[StatSummary]) -> Self {
        Self(
            summaries
                .iter()
                .map(|s| (s.id.clone(), s.clone()))
                .collect(),
        )
    }

    /// Load a snapshot; `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StatisticsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut snapshot: Self =
            serde_json::from_str(&content).map_err(|source| StatisticsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for (id, summary) in snapshot.0.iter_mut() {
            summary.id = id.clone();
        }
        debug!(path = %path.display(), entries = snapshot.0.len(), "reference loaded");
        Ok(Some(snapshot))
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        let write_err = |message: String| StatisticsError::Write {
            path: path.to_path_buf(),
            message,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        fs::write(path, json + "\n").map_err(|e| write_err(e.to_string()))?;
        info!(path = %path.display(), entries = self.0.len(), "reference written");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&StatSummary> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-synthetic entries, sorted like a results table
    pub fn entries(&self) -> Vec<&StatSummary> {
        let mut entries: Vec<&StatSummary> =
            self.0.values().filter(|s| !is_synthetic(&s.id)).collect();
        entries.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
        entries
    }

    /// Compare current summaries against this reference
    ///
    /// The synthetic power points are left out of every list.
    pub fn compare(&self, current: &[StatSummary]) -> Comparison {
        let mut comparison = Comparison::default();

        for summary in current.iter().filter(|s| !is_synthetic(&s.id)) {
            match self.0.get(&summary.id) {
                Some(reference) => comparison.deltas.push(StatDelta::between(summary, reference)),
                None => comparison.new_in_current.push(summary.name.clone()),
            }
        }

        comparison.missing_in_current = self
            .0
            .values()
            .filter(|r| !is_synthetic(&r.id))
            .filter(|r| !current.iter().any(|s| s.id == r.id))
            .map(|r| r.name.clone())
            .collect();

        comparison
    }
}

/// Current minus reference, per statistic
#[derive(Debug, Clone, PartialEq)]
pub struct StatDelta {
    pub id: String,
    pub name: String,
    pub mean: f64,
    pub stddev: f64,
    pub max_dev: f64,
    pub min: f64,
    pub max: f64,
    pub share: Option<f64>,
}

impl StatDelta {
    fn between(current: &StatSummary, reference: &StatSummary) -> Self {
        let share = match (current.share, reference.share) {
            (Some(c), Some(r)) => Some(c - r),
            _ => None,
        };
        Self {
            id: current.id.clone(),
            name: current.name.clone(),
            mean: current.mean - reference.mean,
            stddev: current.stddev - reference.stddev,
            max_dev: current.max_dev - reference.max_dev,
            min: current.min - reference.min,
            max: current.max - reference.max,
            share,
        }
    }

    /// All differences are exactly zero
    pub fn is_zero(&self) -> bool {
        self.mean == 0.0
            && self.stddev == 0.0
            && self.max_dev == 0.0
            && self.min == 0.0
            && self.max == 0.0
            && self.share.map_or(true, |s| s == 0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub deltas: Vec<StatDelta>,
    /// Names present in the reference but not in this run
    pub missing_in_current: Vec<String>,
    /// Names present in this run but not in the reference
    pub new_in_current: Vec<String>,
}

impl Comparison {
    /// Deltas worth printing
    pub fn changed(&self) -> impl Iterator<Item = &StatDelta> {
        self.deltas.iter().filter(|d| !d.is_zero())
    }
}

/// What `apply_reference` did
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    /// No reference existed; the current summaries were stored
    Written,
    /// The run was compared against an existing reference
    Compared {
        reference: ReferenceSnapshot,
        comparison: Comparison,
    },
}

/// Write the reference if absent, otherwise compare against it
pub fn apply_reference(path: &Path, summaries: &[StatSummary]) -> Result<ReferenceOutcome> {
    match ReferenceSnapshot::load(path)? {
        Some(reference) => {
            let comparison = reference.compare(summaries);
            Ok(ReferenceOutcome::Compared {
                reference,
                comparison,
            })
        }
        None => {
            ReferenceSnapshot::from_summaries(summaries).store(path)?;
            Ok(ReferenceOutcome::Written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EntryKind;

    fn summary(id: &str, samples: &[f64]) -> StatSummary {
        StatSummary::from_samples(id, &id.to_uppercase(), EntryKind::Point, samples).unwrap()
    }

    #[test]
    fn test_reference_written_then_compared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        let summaries = vec![
            summary("power_on", &[0.0]),
            summary("kernel", &[1.0, 1.5]),
            summary("power_off", &[4.0, 4.0]),
        ];

        assert_eq!(apply_reference(&path, &summaries).unwrap(), ReferenceOutcome::Written);
        assert!(path.exists());

        match apply_reference(&path, &summaries).unwrap() {
            ReferenceOutcome::Compared {
                reference,
                comparison,
            } => {
                assert_eq!(reference.get("kernel").map(|s| s.id.as_str()), Some("kernel"));
                assert_eq!(reference.entries().len(), 1);
                assert_eq!(comparison.deltas.len(), 1);
                assert_eq!(comparison.changed().count(), 0);
                assert!(comparison.missing_in_current.is_empty());
                assert!(comparison.new_in_current.is_empty());
            }
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_compare_reports_differences() {
        let reference = ReferenceSnapshot::from_summaries(&[
            summary("kernel", &[1.0]),
            summary("gone", &[2.0]),
            summary("power_off", &[5.0]),
        ]);
        let current = vec![summary("kernel", &[1.25]), summary("fresh", &[3.0])];

        let comparison = reference.compare(&current);
        assert_eq!(comparison.missing_in_current, vec!["GONE".to_string()]);
        assert_eq!(comparison.new_in_current, vec!["FRESH".to_string()]);
        let changed: Vec<_> = comparison.changed().collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].mean, 0.25);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            ReferenceSnapshot::load(&path),
            Err(StatisticsError::Parse { .. })
        ));
        assert!(ReferenceSnapshot::load(&dir.path().join("missing.json"))
            .unwrap()
            .is_none());
    }
}
