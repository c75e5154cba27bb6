//! Main correlator implementation.

use std::collections::HashSet;

use contracts::{
    BootBlueprint, BootEvent, Catalog, ContractError, EntryKind, History, IntervalConfig,
    MultiMatchPolicy, SourceTag, POWER_OFF, POWER_ON,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::outcome::{Completion, IngestOutcome, IntervalReport, MatchReport, TaskHook};
use crate::point::{suffixed_id, CompiledPoint};

/// Display name of the synthetic power-on point
pub const POWER_ON_NAME: &str = "-- Power on --";
/// Display name of the synthetic power-off point
pub const POWER_OFF_NAME: &str = "-- Power off --";

#[derive(Debug, Clone)]
struct CompiledInterval {
    id: String,
    name: String,
    from: String,
    to: String,
}

impl From<&IntervalConfig> for CompiledInterval {
    fn from(config: &IntervalConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.display_name(),
            from: config.from.clone(),
            to: config.to.clone(),
        }
    }
}

/// Event correlator
///
/// Owns the point and interval tables, the sample history and the
/// per-iteration state. Called only from the coordinator.
#[derive(Debug)]
pub struct Correlator {
    /// Declared points first, then synthesized suffixed points
    points: Vec<CompiledPoint>,
    /// Number of declared points at the front of `points`
    declared: usize,
    intervals: Vec<CompiledInterval>,
    history: History,
    catalog: Catalog,
    /// Ids matched in the current window
    matched: HashSet<String>,
    window_start: Option<f64>,
    last_ts: f64,
    /// Completed (counted) iterations
    iteration: usize,
    default_source: SourceTag,
    any_match: bool,
    /// Ids recorded since the window opened, for `abort_window`
    window_log: Vec<String>,
}

impl Correlator {
    /// Build the point/interval tables from a validated blueprint
    pub fn new(blueprint: &BootBlueprint) -> Result<Self, ContractError> {
        let points = blueprint
            .triggers
            .iter()
            .map(CompiledPoint::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let intervals: Vec<CompiledInterval> =
            blueprint.intervals.iter().map(CompiledInterval::from).collect();

        let mut catalog = Catalog::new();
        catalog.register(POWER_ON, POWER_ON_NAME, EntryKind::Point);
        for point in &points {
            catalog.register(&point.id, &point.name, EntryKind::Point);
        }
        catalog.register(POWER_OFF, POWER_OFF_NAME, EntryKind::Point);
        for interval in &intervals {
            catalog.register(&interval.id, &interval.name, EntryKind::Interval);
        }

        Ok(Self {
            declared: points.len(),
            points,
            intervals,
            history: History::new(),
            catalog,
            matched: HashSet::new(),
            window_start: None,
            last_ts: 0.0,
            iteration: 0,
            default_source: SourceTag::new(&blueprint.settings.default_source),
            any_match: false,
            window_log: Vec::new(),
        })
    }

    /// Open a measurement window at `at`
    pub fn begin_window(&mut self, at: f64) {
        debug!(iteration = self.iteration + 1, at, "measurement window opened");
        self.window_start = Some(at);
        self.last_ts = at;
        self.matched.clear();
        self.any_match = false;
        self.window_log.clear();

        // Retried spurious windows must not record power_on twice
        if self.history.len_of(POWER_ON) == self.iteration {
            self.history.push(POWER_ON, 0.0);
            self.window_log.push(POWER_ON.to_string());
        }
    }

    /// Drop the open window and every sample it recorded
    ///
    /// Used when the run is interrupted mid-iteration, so the history only
    /// holds completed iterations.
    pub fn abort_window(&mut self) {
        if self.window_start.take().is_none() {
            return;
        }
        while let Some(id) = self.window_log.pop() {
            self.history.pop(&id);
        }
        debug!(iteration = self.iteration + 1, "open window discarded");
        self.matched.clear();
        self.any_match = false;
    }

    /// Close the window at `at`
    ///
    /// A counted window records `power_off`, derives intervals ending there and
    /// advances the iteration. Returns those intervals.
    pub fn end_window(&mut self, at: f64, counted: bool) -> Vec<IntervalReport> {
        let Some(start) = self.window_start.take() else {
            return Vec::new();
        };
        if !counted {
            debug!(iteration = self.iteration + 1, "window closed without counting");
            return Vec::new();
        }

        if self.history.len_of(POWER_OFF) == self.iteration {
            let elapsed = at - start;
            self.history.push(POWER_OFF, elapsed);
            self.matched.insert(POWER_OFF.to_string());
            metrics::histogram!("bootstats_elapsed_seconds", "point" => POWER_OFF).record(elapsed);
        }
        let intervals = self.derive_intervals(POWER_OFF);
        self.iteration += 1;
        self.window_log.clear();
        intervals
    }

    /// Evaluate one event against the point table
    #[instrument(
        level = "trace",
        name = "correlator_ingest",
        skip(self, event),
        fields(source = %event.source, timestamp = event.timestamp)
    )]
    pub fn ingest(&mut self, event: &BootEvent) -> IngestOutcome {
        let Some(start) = self.window_start else {
            return IngestOutcome::Discarded;
        };

        let mut blocked: Option<String> = None;
        let mut found: Option<usize> = None;
        for (idx, point) in self.points[..self.declared].iter().enumerate() {
            if !point.accepts_source(&event.source, &self.default_source)
                || !point.matches(&event.payload)
            {
                continue;
            }
            if let Some(gate) = self.gate_failure(point) {
                trace!(point = %point.id, gate = %gate, "ordering gate failed");
                blocked.get_or_insert_with(|| point.id.clone());
                continue;
            }
            found = Some(idx);
            break;
        }

        let Some(idx) = found else {
            return match blocked {
                Some(point) => {
                    debug!(point = %point, "match blocked by before/after gate");
                    metrics::counter!("bootstats_gate_rejections_total", "point" => point.clone())
                        .increment(1);
                    IngestOutcome::Blocked { point }
                }
                None => IngestOutcome::NoMatch,
            };
        };

        let id = match self.resolve_duplicate(idx) {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };
        let Some(point) = self.points.iter().find(|p| p.id == id).cloned() else {
            return IngestOutcome::NoMatch;
        };

        let elapsed = event.timestamp - start;
        let delta = event.timestamp - self.last_ts;
        self.last_ts = event.timestamp;
        self.history.push(&id, elapsed);
        self.window_log.push(id.clone());
        self.matched.insert(id.clone());
        self.any_match = true;

        let width = self.catalog.max_name_len();
        info!(
            point = %id,
            "{:>width$} {elapsed:10.6}  (delta {delta:10.6})",
            point.name
        );
        metrics::counter!("bootstats_trigger_matches_total", "point" => id.clone()).increment(1);
        metrics::histogram!("bootstats_elapsed_seconds", "point" => id.clone()).record(elapsed);

        let intervals = self.derive_intervals(&id);
        let task_hooks = Self::task_hooks(&point);
        let completion = self.check_completion(&point);

        IngestOutcome::Matched(MatchReport {
            id,
            name: point.name,
            elapsed,
            delta,
            intervals,
            task_hooks,
            completion,
        })
    }

    /// Whether any point matched in the current window
    pub fn matched_any(&self) -> bool {
        self.any_match
    }

    pub fn is_window_open(&self) -> bool {
        self.window_start.is_some()
    }

    pub fn window_start(&self) -> Option<f64> {
        self.window_start
    }

    /// Completed (counted) iterations so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn is_matched(&self, id: &str) -> bool {
        self.matched.contains(id)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn into_parts(self) -> (History, Catalog) {
        (self.history, self.catalog)
    }

    /// `id` already has a sample for the current iteration
    fn has_sample(&self, id: &str) -> bool {
        self.history.len_of(id) > self.iteration
    }

    fn gate_failure<'a>(&self, point: &'a CompiledPoint) -> Option<&'a str> {
        if let Some(before) = point.before.as_deref() {
            if self.has_sample(before) {
                return Some(before);
            }
        }
        if let Some(after) = point.after.as_deref() {
            if !self.has_sample(after) {
                return Some(after);
            }
        }
        None
    }

    /// Id to record for declared point `idx`, applying its multi-match policy
    fn resolve_duplicate(&mut self, idx: usize) -> Result<String, IngestOutcome> {
        let id = self.points[idx].id.clone();
        if !self.has_sample(&id) {
            return Ok(id);
        }

        match self.points[idx].policy {
            MultiMatchPolicy::AcceptSuffixed => Ok(self.suffixed_point(idx)),
            MultiMatchPolicy::Ignore => {
                trace!(point = %id, "duplicate ignored");
                Err(IngestOutcome::Duplicate {
                    point: id,
                    policy: MultiMatchPolicy::Ignore,
                })
            }
            MultiMatchPolicy::RejectAndWarn => {
                warn!(
                    point = %id,
                    "received \"{id}\" multiple times, ignoring (set multi_trigger to accept multiple values)"
                );
                metrics::counter!("bootstats_duplicates_rejected_total", "point" => id.clone())
                    .increment(1);
                Err(IngestOutcome::Duplicate {
                    point: id,
                    policy: MultiMatchPolicy::RejectAndWarn,
                })
            }
        }
    }

    /// Lowest `<id>_<n>` (n >= 2) without a sample this iteration, created on first use
    fn suffixed_point(&mut self, idx: usize) -> String {
        let base = self.points[idx].id.clone();
        let mut n = 2;
        loop {
            let id = suffixed_id(&base, n);
            if self.history.len_of(&id) <= self.iteration {
                if !self.points.iter().any(|p| p.id == id) {
                    let copy = self.points[idx].suffixed(n);
                    debug!(point = %copy.id, "new suffixed point");
                    self.catalog.register(&copy.id, &copy.name, EntryKind::Point);
                    self.points.push(copy);
                }
                return id;
            }
            n += 1;
        }
    }

    /// Intervals ending at `to` whose endpoints both have a sample this iteration
    fn derive_intervals(&mut self, to: &str) -> Vec<IntervalReport> {
        let mut reports = Vec::new();
        for interval in self.intervals.iter().filter(|i| i.to == to) {
            if !self.has_sample(&interval.from) || !self.has_sample(&interval.to) {
                continue;
            }
            if self.has_sample(&interval.id) {
                continue;
            }
            let (Some(from), Some(to)) = (
                self.history.last(&interval.from),
                self.history.last(&interval.to),
            ) else {
                continue;
            };
            let value = to - from;
            self.history.push(&interval.id, value);
            self.window_log.push(interval.id.clone());
            info!(interval = %interval.id, "{} {value:10.6}", interval.name);
            reports.push(IntervalReport {
                id: interval.id.clone(),
                name: interval.name.clone(),
                value,
            });
        }
        reports
    }

    fn task_hooks(point: &CompiledPoint) -> Vec<TaskHook> {
        let owner = point.duplicate_of.clone().unwrap_or_else(|| point.id.clone());
        let mut hooks = Vec::new();
        if let Some(task) = &point.start_task {
            hooks.push(TaskHook::Start {
                task: task.clone(),
                point: owner.clone(),
            });
        }
        if let Some(task) = &point.stop_task {
            hooks.push(TaskHook::Stop {
                task: task.clone(),
                point: owner,
            });
        }
        hooks
    }

    /// Every declared point matched, or any matched point is a power-cycle signal
    fn check_completion(&self, completing: &CompiledPoint) -> Option<Completion> {
        let declared = &self.points[..self.declared];
        if let Some(signal) = declared
            .iter()
            .find(|p| p.power_cycle && self.matched.contains(&p.id))
        {
            return Some(Completion {
                delay: signal.power_cycle_after,
            });
        }
        if declared.iter().all(|p| self.matched.contains(&p.id)) {
            return Some(Completion {
                delay: completing.power_cycle_after,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TriggerConfig;
    use std::time::Duration;

    fn blueprint(triggers: Vec<TriggerConfig>, intervals: Vec<IntervalConfig>) -> BootBlueprint {
        BootBlueprint {
            triggers,
            intervals,
            ..Default::default()
        }
    }

    fn interval(id: &str, from: &str, to: &str) -> IntervalConfig {
        IntervalConfig {
            id: id.into(),
            name: None,
            from: from.into(),
            to: to.into(),
        }
    }

    fn ev(ts: f64, line: &'static str) -> BootEvent {
        BootEvent::new(ts, line, "serial")
    }

    #[test]
    fn test_discarded_without_window() {
        let mut c = Correlator::new(&blueprint(vec![TriggerConfig::literal("b", "BBB")], vec![]))
            .unwrap();
        assert_eq!(c.ingest(&ev(1.0, "BBB")), IngestOutcome::Discarded);
        assert!(c.history().samples("b").is_empty());
    }

    #[test]
    fn test_match_appends_exactly_one_sample() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("a", "AAA"),
                TriggerConfig::literal("b", "BBB"),
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(10.0);
        let outcome = c.ingest(&ev(11.25, "xxBBBxx"));
        assert!(outcome.is_match());
        assert_eq!(c.history().samples("b"), &[1.25]);
        assert!(c.is_matched("b"));
        assert!(!c.is_matched("a"));
        assert!(c.matched_any());
    }

    #[test]
    fn test_first_declared_point_wins() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("first", "boot"),
                TriggerConfig::literal("second", "boot"),
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "boot"));
        assert_eq!(c.history().len_of("first"), 1);
        assert_eq!(c.history().len_of("second"), 0);
    }

    #[test]
    fn test_after_gate_blocks() {
        let mut b = TriggerConfig::literal("B", "BBB");
        b.after = Some("A".into());
        let mut c = Correlator::new(&blueprint(vec![TriggerConfig::literal("A", "AAA"), b], vec![]))
            .unwrap();
        c.begin_window(0.0);
        assert_eq!(
            c.ingest(&ev(0.5, "BBB")),
            IngestOutcome::Blocked { point: "B".into() }
        );
        assert!(c.history().samples("B").is_empty());

        c.ingest(&ev(1.0, "AAA"));
        assert!(c.ingest(&ev(1.5, "BBB")).is_match());
        assert_eq!(c.history().samples("B"), &[1.5]);
    }

    #[test]
    fn test_before_gate_blocks() {
        let mut a = TriggerConfig::literal("early", "msg");
        a.before = Some("late".into());
        let mut c = Correlator::new(&blueprint(
            vec![a, TriggerConfig::literal("late", "LATE")],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "LATE"));
        assert_eq!(
            c.ingest(&ev(2.0, "msg")),
            IngestOutcome::Blocked {
                point: "early".into()
            }
        );
    }

    #[test]
    fn test_gated_point_falls_through_to_later_point() {
        let mut a = TriggerConfig::literal("gated", "net");
        a.after = Some("never".into());
        let mut c = Correlator::new(&blueprint(
            vec![
                a,
                TriggerConfig::literal("never", "NEVER"),
                TriggerConfig::literal("open", "net"),
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        match c.ingest(&ev(1.0, "net up")) {
            IngestOutcome::Matched(report) => assert_eq!(report.id, "open"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_multi_trigger_suffixing() {
        let mut x = TriggerConfig::literal("X", "link up");
        x.multi_trigger = true;
        let mut c = Correlator::new(&blueprint(vec![x, TriggerConfig::literal("end", "END")], vec![]))
            .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "link up"));
        match c.ingest(&ev(2.0, "link up")) {
            IngestOutcome::Matched(report) => {
                assert_eq!(report.id, "X_2");
                assert_eq!(report.name, "X 2");
            }
            other => panic!("unexpected {other:?}"),
        }
        c.ingest(&ev(3.0, "link up"));
        assert_eq!(c.history().samples("X"), &[1.0]);
        assert_eq!(c.history().samples("X_2"), &[2.0]);
        assert_eq!(c.history().samples("X_3"), &[3.0]);
        assert_eq!(c.catalog().name_of("X_3"), "X 3");

        // Next iteration reuses the suffixed series
        c.end_window(4.0, true);
        c.begin_window(10.0);
        c.ingest(&ev(11.0, "link up"));
        c.ingest(&ev(12.0, "link up"));
        assert_eq!(c.history().samples("X_2"), &[2.0, 2.0]);
        assert_eq!(c.history().len_of("X_3"), 1);
    }

    #[test]
    fn test_duplicate_policies() {
        let mut quiet = TriggerConfig::literal("quiet", "Q");
        quiet.ignore_multiple_trigger = true;
        let mut c = Correlator::new(&blueprint(
            vec![quiet, TriggerConfig::literal("loud", "L")],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "Q"));
        c.ingest(&ev(1.0, "L"));
        assert_eq!(
            c.ingest(&ev(2.0, "Q")),
            IngestOutcome::Duplicate {
                point: "quiet".into(),
                policy: MultiMatchPolicy::Ignore
            }
        );
        assert_eq!(
            c.ingest(&ev(2.0, "L")),
            IngestOutcome::Duplicate {
                point: "loud".into(),
                policy: MultiMatchPolicy::RejectAndWarn
            }
        );
        assert_eq!(c.history().samples("loud"), &[1.0]);
    }

    #[test]
    fn test_interval_derivation() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("A", "AAA"),
                TriggerConfig::literal("B", "BBB"),
            ],
            vec![interval("ab", "A", "B")],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "AAA"));
        match c.ingest(&ev(2.5, "BBB")) {
            IngestOutcome::Matched(report) => {
                assert_eq!(report.intervals.len(), 1);
                assert_eq!(report.intervals[0].value, 1.5);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(c.history().samples("ab"), &[1.5]);
    }

    #[test]
    fn test_interval_needs_both_endpoints_this_iteration() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("A", "AAA"),
                TriggerConfig::literal("B", "BBB"),
            ],
            vec![interval("ab", "A", "B")],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "BBB"));
        assert!(c.history().samples("ab").is_empty());
    }

    #[test]
    fn test_interval_to_power_off() {
        let mut c = Correlator::new(&blueprint(
            vec![TriggerConfig::literal("login", "login:")],
            vec![interval("shutdown", "login", "power_off")],
        ))
        .unwrap();
        c.begin_window(100.0);
        c.ingest(&ev(103.0, "login:"));
        let intervals = c.end_window(104.5, true);
        assert_eq!(intervals.len(), 1);
        assert_eq!(c.history().samples("shutdown"), &[1.5]);
        assert_eq!(c.history().samples(POWER_OFF), &[4.5]);
        assert_eq!(c.history().samples(POWER_ON), &[0.0]);
    }

    #[test]
    fn test_power_cycle_completion_with_delay() {
        let mut done = TriggerConfig::literal("done", "DONE");
        done.power_cycle = true;
        done.power_cycle_after = 2.0;
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("start", "START"),
                TriggerConfig::literal("never", "NEVER"),
                done,
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        assert!(c.ingest(&ev(0.0, "START")).completion().is_none());
        let outcome = c.ingest(&ev(1.2, "DONE"));
        assert_eq!(
            outcome.completion(),
            Some(&Completion {
                delay: Duration::from_secs(2)
            })
        );
    }

    #[test]
    fn test_all_matched_completion() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("a", "A"),
                TriggerConfig::literal("b", "B"),
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(0.0);
        assert!(c.ingest(&ev(1.0, "B")).completion().is_none());
        assert!(c.ingest(&ev(2.0, "A")).completion().is_some());
    }

    #[test]
    fn test_spurious_window_not_counted() {
        let mut c = Correlator::new(&blueprint(vec![TriggerConfig::literal("a", "A")], vec![]))
            .unwrap();
        c.begin_window(0.0);
        assert!(!c.matched_any());
        c.end_window(1.0, false);
        assert_eq!(c.iteration(), 0);
        c.begin_window(5.0);
        // power_on recorded once for the retried iteration
        assert_eq!(c.history().samples(POWER_ON), &[0.0]);
        assert!(c.history().samples(POWER_OFF).is_empty());
    }

    #[test]
    fn test_task_hooks_reported() {
        let mut t = TriggerConfig::literal("net", "link up");
        t.start_task = Some("heartbeat".into());
        t.stop_task = Some("other".into());
        let mut c = Correlator::new(&blueprint(vec![t], vec![])).unwrap();
        c.begin_window(0.0);
        match c.ingest(&ev(1.0, "link up")) {
            IngestOutcome::Matched(report) => assert_eq!(
                report.task_hooks,
                vec![
                    TaskHook::Start {
                        task: "heartbeat".into(),
                        point: "net".into()
                    },
                    TaskHook::Stop {
                        task: "other".into(),
                        point: "net".into()
                    },
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_default_source_filter() {
        let mut c = Correlator::new(&blueprint(vec![TriggerConfig::literal("a", "A")], vec![]))
            .unwrap();
        c.begin_window(0.0);
        assert_eq!(
            c.ingest(&BootEvent::new(1.0, "A", "journald")),
            IngestOutcome::NoMatch
        );
    }

    #[test]
    fn test_delta_tracks_previous_match() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("a", "A"),
                TriggerConfig::literal("b", "B"),
            ],
            vec![],
        ))
        .unwrap();
        c.begin_window(10.0);
        c.ingest(&ev(11.0, "A"));
        match c.ingest(&ev(13.5, "B")) {
            IngestOutcome::Matched(r) => {
                assert_eq!(r.elapsed, 3.5);
                assert_eq!(r.delta, 2.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_abort_window_rolls_back_open_iteration() {
        let mut c = Correlator::new(&blueprint(
            vec![
                TriggerConfig::literal("a", "A"),
                TriggerConfig::literal("b", "B"),
            ],
            vec![interval("ab", "a", "b")],
        ))
        .unwrap();
        c.begin_window(0.0);
        c.ingest(&ev(1.0, "A"));
        c.ingest(&ev(2.0, "B"));
        c.end_window(3.0, true);

        c.begin_window(10.0);
        c.ingest(&ev(11.0, "A"));
        c.ingest(&ev(12.5, "B"));
        c.abort_window();

        assert!(!c.is_window_open());
        assert_eq!(c.iteration(), 1);
        assert_eq!(c.history().samples(POWER_ON), &[0.0]);
        assert_eq!(c.history().samples("a"), &[1.0]);
        assert_eq!(c.history().samples("ab"), &[1.0]);
        assert_eq!(c.history().samples(POWER_OFF), &[3.0]);
    }
}
