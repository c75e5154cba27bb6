//! Plain-text tables for results, comparison and reference

use std::fmt::Write;

use contracts::{EntryKind, POWER_ON};

use crate::reference::{Comparison, StatDelta};
use crate::summary::StatSummary;

/// One table column: header and cell width
#[derive(Debug, Clone, Copy)]
enum Column {
    Avg,
    Dur,
    Dev,
    Share,
    MaxDev,
    Min,
    Max,
    Weight,
}

const COLUMNS: [Column; 8] = [
    Column::Avg,
    Column::Dur,
    Column::Dev,
    Column::Share,
    Column::MaxDev,
    Column::Min,
    Column::Max,
    Column::Weight,
];

impl Column {
    fn header(self) -> &'static str {
        match self {
            Column::Avg => "avg",
            Column::Dur => "dur",
            Column::Dev => "dev",
            Column::Share => "share",
            Column::MaxDev => "max_dev",
            Column::Min => "min",
            Column::Max => "max",
            Column::Weight => "weight",
        }
    }

    fn width(self) -> usize {
        match self {
            Column::Share => 7,
            Column::Weight => 6,
            _ => 10,
        }
    }

    /// Blank for missing or zero values
    fn cell(self, value: Option<f64>) -> String {
        let width = self.width();
        match value {
            Some(v) if v != 0.0 => match self {
                Column::Share | Column::Weight => format!("{:>width$}", v.trunc() as i64),
                _ => format!("{v:>width$.6}"),
            },
            _ => format!("{:>width$}", ""),
        }
    }
}

/// Cell values of one row, in `COLUMNS` order
struct Row<'a> {
    name: &'a str,
    values: [Option<f64>; 8],
}

impl<'a> Row<'a> {
    fn from_summary(s: &'a StatSummary) -> Self {
        let (avg, dur) = match s.kind {
            EntryKind::Point => (Some(s.mean), None),
            EntryKind::Interval => (None, Some(s.mean)),
        };
        Self {
            name: &s.name,
            values: [
                avg,
                dur,
                Some(s.stddev),
                s.share,
                Some(s.max_dev),
                Some(s.min),
                Some(s.max),
                Some(s.count as f64),
            ],
        }
    }

    fn from_delta(d: &'a StatDelta, kind: EntryKind) -> Self {
        let (avg, dur) = match kind {
            EntryKind::Point => (Some(d.mean), None),
            EntryKind::Interval => (None, Some(d.mean)),
        };
        Self {
            name: &d.name,
            values: [
                avg,
                dur,
                Some(d.stddev),
                d.share,
                Some(d.max_dev),
                Some(d.min),
                Some(d.max),
                None,
            ],
        }
    }

    fn write(&self, out: &mut String, name_width: usize) {
        let _ = write!(out, "\t{:<name_width$}", self.name);
        for (column, value) in COLUMNS.iter().zip(self.values) {
            let _ = write!(out, " {}", column.cell(value));
        }
        out.push('\n');
    }
}

fn header(out: &mut String, name_width: usize) {
    let _ = write!(out, "\t{:<name_width$}", "Id");
    for column in COLUMNS {
        let _ = write!(out, " {:>width$}", column.header(), width = column.width());
    }
    out.push('\n');
}

/// Results table; the power-on row is hidden
pub fn render_results(summaries: &[StatSummary], iterations: usize, name_width: usize) -> String {
    let mut out = format!("Results after {iterations} runs:\n");
    header(&mut out, name_width);
    for summary in summaries.iter().filter(|s| s.id != POWER_ON) {
        Row::from_summary(summary).write(&mut out, name_width);
    }
    out
}

/// Comparison table: missing ids by name, then rows with non-zero deltas
pub fn render_comparison(
    comparison: &Comparison,
    current: &[StatSummary],
    reference_path: &str,
    name_width: usize,
) -> String {
    let mut out = format!("Comparison with reference: {reference_path}\n");
    for name in &comparison.new_in_current {
        let _ = writeln!(out, "\t{name:<name_width$} (not in reference)");
    }
    for name in &comparison.missing_in_current {
        let _ = writeln!(out, "\t{name:<name_width$} (missing in this run)");
    }
    for delta in comparison.changed() {
        let kind = current
            .iter()
            .find(|s| s.id == delta.id)
            .map(|s| s.kind)
            .unwrap_or(EntryKind::Point);
        Row::from_delta(delta, kind).write(&mut out, name_width);
    }
    out
}

/// Reference table, without the synthetic power points
pub fn render_reference(entries: &[&StatSummary], reference_path: &str, name_width: usize) -> String {
    let mut out = format!("\nReference values: {reference_path}\n");
    for entry in entries {
        Row::from_summary(entry).write(&mut out, name_width);
    }
    out
}

/// Name column width: the longest display name, at least as wide as "Id"
pub fn name_width<'a>(names: impl IntoIterator<Item = &'a str>) -> usize {
    names
        .into_iter()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(0)
        .max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceSnapshot;

    fn summaries() -> Vec<StatSummary> {
        vec![
            StatSummary::from_samples("power_on", "-- Power on --", EntryKind::Point, &[0.0, 0.0])
                .unwrap(),
            StatSummary::from_samples("boot", "Boot", EntryKind::Interval, &[1.0, 1.0]).unwrap(),
            StatSummary::from_samples("done", "Done", EntryKind::Point, &[1.2, 0.9]).unwrap(),
        ]
    }

    #[test]
    fn test_results_table_layout() {
        let table = render_results(&summaries(), 2, 14);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Results after 2 runs:");
        assert!(lines[1].starts_with("\tId            "));
        assert!(lines[1].contains("       avg        dur"));
        assert!(!table.contains("Power on"));

        // interval: avg blank, dur filled
        let boot = lines[2];
        assert!(boot.starts_with("\tBoot"));
        assert!(boot.contains("             1.000000"));
        let done = lines[3];
        assert!(done.contains("  1.050000"));
        assert!(done.contains("  0.900000"));
        assert!(done.ends_with("     2"));
    }

    #[test]
    fn test_zero_cells_are_blank() {
        assert_eq!(Column::Dev.cell(Some(0.0)), " ".repeat(10));
        assert_eq!(Column::Share.cell(None), " ".repeat(7));
        assert_eq!(Column::Share.cell(Some(37.9)), "     37");
        assert_eq!(Column::Min.cell(Some(-0.25)), " -0.250000");
    }

    #[test]
    fn test_comparison_shows_only_changes() {
        let current = summaries();
        let reference = ReferenceSnapshot::from_summaries(&current);
        let comparison = reference.compare(&current);
        let table = render_comparison(&comparison, &current, "ref.json", 14);
        assert_eq!(table.lines().count(), 1);

        let mut changed = current.clone();
        changed[2] =
            StatSummary::from_samples("done", "Done", EntryKind::Point, &[1.5, 0.9]).unwrap();
        let comparison = reference.compare(&changed);
        let table = render_comparison(&comparison, &changed, "ref.json", 14);
        assert!(table.contains("\tDone"));
        assert!(table.contains("  0.150000"));
    }

    #[test]
    fn test_name_width() {
        assert_eq!(name_width(["a"]), 2);
        assert_eq!(name_width(["Boot", "Kernel start"]), 12);
    }
}
