//! Run statistics and the printed report.

use std::fmt::Write;
use std::time::Duration;

use contracts::RunSettings;
use coordinator::RunOutcome;
use statistics::{
    apply_reference, name_width, render_comparison, render_reference, render_results,
    ReferenceOutcome, StatSummary, StatisticsError,
};
use tracing::{info, warn};

/// Statistics from a measurement run
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Sorted summaries of every recorded point and interval
    pub summaries: Vec<StatSummary>,

    /// Wall-clock duration of the whole run
    pub duration: Duration,
}

impl RunReport {
    pub fn new(outcome: RunOutcome, duration: Duration) -> Self {
        let summaries = statistics::summarize(&outcome.history, &outcome.catalog);
        Self {
            outcome,
            summaries,
            duration,
        }
    }

    pub fn iterations(&self) -> usize {
        self.outcome.iterations
    }

    /// Results table, then the reference comparison when a reference file is set
    ///
    /// A missing reference file is written from this run. Nothing is
    /// written when no iteration completed.
    pub fn render(&self, settings: &RunSettings) -> Result<String, StatisticsError> {
        if self.iterations() == 0 {
            return Ok("No iteration completed, no statistics.\n".to_string());
        }

        let width = name_width(self.summaries.iter().map(|s| s.name.as_str()));
        let mut out = render_results(&self.summaries, self.iterations(), width);

        let Some(ref_file) = &settings.ref_file else {
            return Ok(out);
        };
        let path = ref_file.display().to_string();
        match apply_reference(ref_file, &self.summaries)? {
            ReferenceOutcome::Written => {
                info!(path = %path, "reference written");
                let _ = writeln!(out, "\nReference written: {path}");
            }
            ReferenceOutcome::Compared {
                reference,
                comparison,
            } => {
                let entries = reference.entries();
                let width = width.max(name_width(entries.iter().map(|e| e.name.as_str())));
                out.push('\n');
                out.push_str(&render_comparison(
                    &comparison,
                    &self.summaries,
                    &path,
                    width,
                ));
                if settings.show_reference {
                    out.push_str(&render_reference(&entries, &path, width));
                }
            }
        }
        Ok(out)
    }

    /// Log the run counters
    pub fn log_summary(&self) {
        let outcome = &self.outcome;
        if outcome.interrupted {
            warn!(
                completed = outcome.iterations,
                "run interrupted, statistics cover completed iterations only"
            );
        }
        info!(
            iterations = outcome.iterations,
            duration_secs = self.duration.as_secs_f64(),
            counters = %outcome.counters,
            events_received = outcome.ingestion.events_received,
            events_dropped = outcome.ingestion.events_dropped,
            "Measurements finished"
        );
        if let Some(gap) = outcome.ingestion.min_read_gap_secs() {
            info!("min time between serial RX: {gap:.6}");
        }
        for (name, metrics) in &outcome.mirrors {
            if metrics.failure_count > 0 {
                warn!(mirror = %name, failures = metrics.failure_count, "mirror lost lines");
            }
        }
    }
}
