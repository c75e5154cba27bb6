//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置快照测试
//! - 端到端场景：脚本事件源 → 协调器 → 统计 (手动时钟、模拟电源驱动)

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::MultiMatchPolicy;

    const FULL_CONFIG: &str = r#"
version = "V1"

[settings]
iterations = 5
cooldown_secs = 0.5
power_on_command = "relay on"
power_off_command = "relay off"
default_source = "serial"
ref_file = "reference.json"

[serial]
device = "/dev/ttyUSB0"
reconnect = true

[journal]
command = "journalctl -f -n 0 -o json"

[mirror]
show_console_diff = true
log_file = "serial.log"

[[triggers]]
id = "uboot"
trigger = "U-Boot 20"

[[triggers]]
id = "kernel"
regexp = "^\\[\\s*0\\.0+\\] Linux version"
after = "uboot"

[[triggers]]
id = "network"
trigger = "link becomes ready"
source = "journald"
multi_trigger = true
start_task = "heartbeat"

[[triggers]]
id = "login"
name = "Login prompt"
trigger = "login:"
powerCycle = true
powerCycleAfter = 0.5
stop_task = "heartbeat"

[[intervals]]
id = "kernel_boot"
from = "kernel"
to = "login"

[[tasks]]
id = "heartbeat"
[tasks.params]
period_ms = "250"
"#;

    #[test]
    fn test_full_config_snapshot() {
        let blueprint = ConfigLoader::load_from_str(FULL_CONFIG, ConfigFormat::Toml).unwrap();

        assert_eq!(blueprint.settings.iterations, 5);
        assert!(blueprint.serial.as_ref().unwrap().reconnect);
        assert_eq!(blueprint.journal.as_ref().unwrap().source, "journald");
        assert_eq!(
            blueprint.journal.as_ref().unwrap().message_field.as_deref(),
            Some("MESSAGE")
        );
        assert!(blueprint.mirror.show_console_diff);

        let ids: Vec<&str> = blueprint.triggers.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["uboot", "kernel", "network", "login"]);

        let login = blueprint.trigger("login").unwrap();
        assert!(login.power_cycle);
        assert_eq!(login.power_cycle_delay().as_secs_f64(), 0.5);
        assert_eq!(login.display_name(), "Login prompt");
        assert_eq!(
            blueprint.trigger("network").unwrap().policy(),
            MultiMatchPolicy::AcceptSuffixed
        );
        assert_eq!(blueprint.tasks[0].param("period_ms"), Some("250"));

        // TOML → blueprint → JSON → blueprint keeps the trigger table
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let back = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(back.triggers.len(), 4);
        assert_eq!(back.intervals[0].from, "kernel");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BootBlueprint, ManualClock, PowerState, POWER_OFF, POWER_ON};
    use coordinator::{Coordinator, RunOutcome, TaskRegistry};
    use ingestion::{EventSource, IngestionPipeline, QueueConfig, ScriptedSource};
    use power_control::{MockPowerDriver, PowerCommand};
    use statistics::{apply_reference, summarize, ReferenceOutcome};
    use tokio_util::sync::CancellationToken;

    fn blueprint(toml: &str) -> BootBlueprint {
        ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap()
    }

    /// Coordinator over scripted sources, manual clock pinned at 0
    async fn run(
        blueprint: &BootBlueprint,
        sources: Vec<ScriptedSource>,
        driver: MockPowerDriver,
    ) -> RunOutcome {
        let clock = ManualClock::new(0.0);
        let mut pipeline = IngestionPipeline::new(
            QueueConfig::new(0),
            CancellationToken::new(),
            Arc::new(clock),
        );
        for source in sources {
            let source: Box<dyn EventSource> = Box::new(source);
            pipeline.register_source(source).unwrap();
        }

        let coordinator =
            Coordinator::new(blueprint, driver, pipeline, &TaskRegistry::with_builtins()).unwrap();
        tokio::time::timeout(Duration::from_secs(10), coordinator.run())
            .await
            .expect("run did not finish")
            .unwrap()
    }

    const TWO_RUNS: &str = r#"
[settings]
iterations = 2
cooldown_secs = 0.0
power_on_command = "on"
power_off_command = "off"

[[triggers]]
id = "start"
trigger = "START"

[[triggers]]
id = "done"
trigger = "DONE"
powerCycle = true
"#;

    fn two_run_script() -> ScriptedSource {
        ScriptedSource::new("serial")
            .mandatory(true)
            .line_at(0.0, "START")
            .line_at(1.2, "DONE")
            .line_at(0.0, "START")
            .line_at(0.9, "DONE")
    }

    /// End-to-end: scripted serial → coordinator → statistics
    #[tokio::test]
    async fn test_e2e_two_iterations_statistics() {
        let driver = MockPowerDriver::new();
        let calls = driver.clone();
        let outcome = run(&blueprint(TWO_RUNS), vec![two_run_script()], driver).await;

        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.interrupted);
        assert_eq!(outcome.history.len_of(POWER_ON), 2);
        assert_eq!(outcome.history.len_of(POWER_OFF), 2);
        assert_eq!(
            calls.calls(),
            vec![
                PowerCommand::Off,
                PowerCommand::On,
                PowerCommand::Off,
                PowerCommand::On,
                PowerCommand::Off,
            ]
        );

        let summaries = summarize(&outcome.history, &outcome.catalog);
        let done = summaries.iter().find(|s| s.id == "done").unwrap();
        assert_eq!(done.count, 2);
        assert!((done.mean - 1.05).abs() < 1e-9);
        assert!((done.stddev - 0.212_132).abs() < 1e-6);
        assert!((done.max_dev - 0.15).abs() < 1e-9);
        assert_eq!(done.min, 0.9);
        assert_eq!(done.max, 1.2);

        // Sorted by mean: power_on (0), start (0), power_off / done
        assert_eq!(summaries[0].id, POWER_ON);
    }

    #[tokio::test]
    async fn test_e2e_reference_written_then_compared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");

        let first = run(&blueprint(TWO_RUNS), vec![two_run_script()], MockPowerDriver::new()).await;
        let summaries = summarize(&first.history, &first.catalog);
        assert_eq!(apply_reference(&path, &summaries).unwrap(), ReferenceOutcome::Written);

        let second = run(&blueprint(TWO_RUNS), vec![two_run_script()], MockPowerDriver::new()).await;
        let summaries = summarize(&second.history, &second.catalog);
        match apply_reference(&path, &summaries).unwrap() {
            ReferenceOutcome::Compared { comparison, .. } => {
                assert!(comparison.missing_in_current.is_empty());
                assert!(comparison.new_in_current.is_empty());
                assert_eq!(comparison.changed().count(), 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_e2e_intervals_and_source_filter() {
        let bp = blueprint(
            r#"
[settings]
iterations = 1
cooldown_secs = 0.0
power_off_command = "off"

[[triggers]]
id = "kernel"
trigger = "Linux version"

[[triggers]]
id = "link"
trigger = "link becomes ready"
source = "journald"
multi_trigger = true

[[triggers]]
id = "login"
trigger = "login:"
after = "kernel"
powerCycle = true

[[intervals]]
id = "userspace"
name = "Userspace"
from = "kernel"
to = "login"

[[intervals]]
id = "relink"
from = "link"
to = "link_2"
"#,
        );

        // The journal lines wait until the window is open
        let journal = ScriptedSource::new("journald")
            .wait(Duration::from_millis(50))
            .line_at(2.0, "eth0: link becomes ready")
            .line_at(2.5, "eth0: link becomes ready");
        let serial = ScriptedSource::new("serial")
            .mandatory(true)
            .line_at(0.5, "login: too early")
            .line_at(1.0, "Linux version 6.6")
            .line_at(1.5, "link becomes ready on the console")
            .wait(Duration::from_millis(200))
            .line_at(3.0, "buildroot login:");

        let outcome = run(&bp, vec![serial, journal], MockPowerDriver::new()).await;

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.history.samples("kernel"), &[1.0]);
        assert_eq!(outcome.history.samples("link"), &[2.0]);
        assert_eq!(outcome.history.samples("link_2"), &[2.5]);
        assert_eq!(outcome.history.samples("login"), &[3.0]);
        assert_eq!(outcome.history.samples("userspace"), &[2.0]);
        assert_eq!(outcome.history.samples("relink"), &[0.5]);
        assert_eq!(outcome.counters.blocked, 1);
    }

    #[tokio::test]
    async fn test_e2e_power_signal_skips_spurious_window() {
        let bp = blueprint(
            r#"
[settings]
iterations = 1
cooldown_secs = 0.0
power_on_command = "on"
power_off_command = "off"

[power_signal]
command = "true"

[[triggers]]
id = "done"
trigger = "DONE"
powerCycle = true
"#,
        );
        let script = ScriptedSource::new("serial")
            .mandatory(true)
            .power_at(1.0, PowerState::On)
            .power_at(2.0, PowerState::Off)
            .power_at(10.0, PowerState::On)
            .line_at(11.5, "DONE")
            .power_at(12.0, PowerState::Off);

        let outcome = run(&bp, vec![script], MockPowerDriver::new()).await;

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.counters.spurious_windows, 1);
        assert_eq!(outcome.history.samples("done"), &[1.5]);
        assert_eq!(outcome.history.samples(POWER_OFF), &[2.0]);
        assert_eq!(outcome.history.samples(POWER_ON), &[0.0]);
    }

    #[tokio::test]
    async fn test_e2e_heartbeat_task_events_match() {
        let bp = blueprint(
            r#"
[settings]
iterations = 1
cooldown_secs = 0.0
power_off_command = "off"

[[triggers]]
id = "network"
trigger = "link up"
start_task = "heartbeat"

[[triggers]]
id = "beat"
trigger = "heartbeat 2"
source = "task_heartbeat"
stop_task = "heartbeat"

[[triggers]]
id = "done"
trigger = "DONE"
powerCycle = true

[[tasks]]
id = "heartbeat"
[tasks.params]
period_ms = "10"
"#,
        );
        let serial = ScriptedSource::new("serial")
            .mandatory(true)
            .line_at(0.5, "link up")
            .wait(Duration::from_millis(300))
            .line_at(4.0, "DONE");

        let outcome = run(&bp, vec![serial], MockPowerDriver::new()).await;

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.history.len_of("beat"), 1);
        assert_eq!(outcome.history.samples("done"), &[4.0]);
        assert!(outcome.counters.task_events >= 2);
    }

    #[tokio::test]
    async fn test_e2e_unknown_task_is_fatal() {
        let bp = blueprint(
            r#"
[settings]
power_off_command = "off"

[[triggers]]
id = "done"
trigger = "DONE"
start_task = "echo"
"#,
        );
        let pipeline = IngestionPipeline::new(
            QueueConfig::new(0),
            CancellationToken::new(),
            Arc::new(ManualClock::new(0.0)),
        );
        let result = Coordinator::new(
            &bp,
            MockPowerDriver::new(),
            pipeline,
            &TaskRegistry::with_builtins(),
        );
        assert!(result.is_err());
    }
}
