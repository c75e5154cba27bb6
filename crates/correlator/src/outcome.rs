//! What the correlator decided about one event

use std::time::Duration;

use contracts::MultiMatchPolicy;

/// Result of `Correlator::ingest`
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// No measurement window open
    Discarded,
    /// No point matched
    NoMatch,
    /// A point matched its pattern but failed a `before`/`after` gate
    Blocked { point: String },
    /// The point already has a sample this iteration and was not recorded again
    Duplicate {
        point: String,
        policy: MultiMatchPolicy,
    },
    /// A sample was recorded
    Matched(MatchReport),
}

impl IngestOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            Self::Matched(report) => report.completion.as_ref(),
            _ => None,
        }
    }
}

/// An accepted match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    /// Recorded id (`<id>_<n>` for a suffixed duplicate)
    pub id: String,
    pub name: String,
    /// Seconds since the window opened
    pub elapsed: f64,
    /// Seconds since the previous match (or window start)
    pub delta: f64,
    pub intervals: Vec<IntervalReport>,
    pub task_hooks: Vec<TaskHook>,
    /// Set when this match completes the iteration
    pub completion: Option<Completion>,
}

/// A derived interval sample
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalReport {
    pub id: String,
    pub name: String,
    pub value: f64,
}

/// Task lifecycle call requested by a matched point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskHook {
    Start { task: String, point: String },
    Stop { task: String, point: String },
}

/// The iteration is complete; power off after `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub delay: Duration,
}
