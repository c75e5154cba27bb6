//! Per-id summary statistics

use contracts::{Catalog, EntryKind, History, POWER_OFF};
use serde::{Deserialize, Serialize};

/// Summary of one point or interval across iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Map key in the reference file, not repeated in the entry
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (Bessel's correction); 0 for one sample
    pub stddev: f64,
    /// Largest absolute deviation from the mean
    pub max_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Intervals only: mean share of the power-off duration, in percent
    pub share: Option<f64>,
}

impl StatSummary {
    /// Summarize one sample series; `None` when empty
    pub fn from_samples(
        id: &str,
        name: &str,
        kind: EntryKind,
        samples: &[f64],
    ) -> Option<Self> {
        let count = samples.len();
        if count == 0 {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / count as f64;
        let stddev = if count > 1 {
            let sq: f64 = samples.iter().map(|s| (s - mean).powi(2)).sum();
            (sq / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let max_dev = samples
            .iter()
            .map(|s| (s - mean).abs())
            .fold(0.0, f64::max);
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            count,
            mean,
            stddev,
            max_dev,
            min,
            max,
            share: None,
        })
    }

    /// Key for the results ordering: points by mean, intervals first
    pub fn sort_key(&self) -> f64 {
        match self.kind {
            EntryKind::Point => self.mean,
            EntryKind::Interval => 0.0,
        }
    }
}

/// Mean of `interval[i] / power_off[i]` in percent
///
/// Only defined when both series have the same length and every power-off
/// duration is positive.
pub fn share_of_power_off(interval: &[f64], power_off: &[f64]) -> Option<f64> {
    if interval.is_empty() || interval.len() != power_off.len() {
        return None;
    }
    if power_off.iter().any(|&p| p <= 0.0) {
        return None;
    }
    let sum: f64 = interval
        .iter()
        .zip(power_off)
        .map(|(i, p)| i / p)
        .sum();
    Some(sum / interval.len() as f64 * 100.0)
}

/// Summaries for every id with at least one sample, sorted for display
pub fn summarize(history: &History, catalog: &Catalog) -> Vec<StatSummary> {
    let power_off = history.samples(POWER_OFF);
    let mut summaries: Vec<StatSummary> = history
        .iter()
        .filter_map(|(id, samples)| {
            let kind = catalog
                .get(id)
                .map(|e| e.kind)
                .unwrap_or(EntryKind::Point);
            let mut summary =
                StatSummary::from_samples(id, catalog.name_of(id), kind, samples)?;
            if kind == EntryKind::Interval {
                summary.share = share_of_power_off(samples, power_off);
            }
            Some(summary)
        })
        .collect();

    // Stable: equal keys keep history order
    summaries.sort_by(|a, b| a.sort_key().total_cmp(&b.sort_key()));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_statistics_correctness() {
        let s = StatSummary::from_samples("x", "x", EntryKind::Point, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.stddev, 1.0);
        assert_eq!(s.max_dev, 1.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.share, None);
    }

    #[test]
    fn test_single_sample() {
        let s = StatSummary::from_samples("x", "x", EntryKind::Point, &[0.75]).unwrap();
        assert_eq!(s.stddev, 0.0);
        assert_eq!(s.max_dev, 0.0);
        assert_eq!(s.min, 0.75);
        assert_eq!(s.max, 0.75);
    }

    #[test]
    fn test_empty_series() {
        assert!(StatSummary::from_samples("x", "x", EntryKind::Point, &[]).is_none());
    }

    #[test]
    fn test_two_iteration_scenario() {
        let s = StatSummary::from_samples("done", "done", EntryKind::Point, &[1.2, 0.9]).unwrap();
        assert!(close(s.mean, 1.05));
        assert!((s.stddev - 0.212_132).abs() < 1e-6);
        assert_eq!(s.min, 0.9);
        assert_eq!(s.max, 1.2);
    }

    #[test]
    fn test_share() {
        assert_eq!(share_of_power_off(&[1.0, 2.0], &[4.0, 4.0]), Some(37.5));
        assert_eq!(share_of_power_off(&[1.0], &[4.0, 4.0]), None);
        assert_eq!(share_of_power_off(&[1.0], &[0.0]), None);
    }

    #[test]
    fn test_summarize_sorting_and_kinds() {
        let mut catalog = Catalog::new();
        catalog.register("power_on", "-- Power on --", EntryKind::Point);
        catalog.register("late", "Late", EntryKind::Point);
        catalog.register("early", "Early", EntryKind::Point);
        catalog.register("power_off", "-- Power off --", EntryKind::Point);
        catalog.register("span", "Span", EntryKind::Interval);

        let mut history = History::new();
        history.push("power_on", 0.0);
        history.push("late", 5.0);
        history.push("early", 1.0);
        history.push("span", 4.0);
        history.push("power_off", 8.0);

        let summaries = summarize(&history, &catalog);
        let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str()).collect();
        // Interval keyed at 0 keeps its history position after power_on
        assert_eq!(ids, vec!["power_on", "span", "early", "late", "power_off"]);
        let span = &summaries[1];
        assert_eq!(span.kind, EntryKind::Interval);
        assert_eq!(span.share, Some(50.0));
        assert_eq!(summaries[2].name, "Early");
    }
}
