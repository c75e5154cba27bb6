//! `run` command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{BootBlueprint, TriggerConfig};
use tracing::info;

use crate::cli::{RunArgs, DEFAULT_CONFIG};
use crate::error::CliError;
use crate::pipeline::{metrics_port, Measurement, MeasurementConfig};

/// Id given to `--trigger` patterns without an `<id>:` prefix
const DEFAULT_TRIGGER_ID: &str = "trigger";

/// Execute the `run` command
pub async fn run_measurements(args: &RunArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        iterations = blueprint.settings.iterations,
        cooldown_secs = blueprint.settings.cooldown_secs,
        triggers = blueprint.triggers.len(),
        intervals = blueprint.intervals.len(),
        tasks = blueprint.tasks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let settings = blueprint.settings.clone();
    let measurement = Measurement::new(MeasurementConfig {
        blueprint,
        buffer_size: args.buffer_size,
        metrics_port: metrics_port(args.metrics_port),
    });
    let report = measurement.run().await?;

    report.log_summary();
    let text = report
        .render(&settings)
        .map_err(CliError::from)
        .context("Failed to process the reference file")?;
    print!("{text}");

    info!("bootstats finished");
    Ok(())
}

/// Config file (if any), then command-line overrides, then validation
pub fn load_blueprint(args: &RunArgs) -> Result<BootBlueprint> {
    let mut blueprint = match config_path(args.config.as_deref())? {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::parse_from_path(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file, using command-line options only");
            BootBlueprint::default()
        }
    };

    apply_overrides(&mut blueprint, args)?;
    ConfigLoader::validate(&blueprint).context("Invalid configuration")?;
    Ok(blueprint)
}

/// An explicit path must exist; the default one is optional
fn config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, CliError> {
    match explicit {
        Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
        Some(path) => Err(CliError::config_not_found(path)),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            Ok(default.exists().then_some(default))
        }
    }
}

/// Command-line options win over the file; flags can only switch things on
pub fn apply_overrides(blueprint: &mut BootBlueprint, args: &RunArgs) -> Result<(), CliError> {
    let settings = &mut blueprint.settings;

    if let Some(iterations) = args.iterations {
        settings.iterations = iterations;
    }
    if let Some(cooldown) = args.cooldown {
        if !cooldown.is_finite() || cooldown < 0.0 {
            return Err(CliError::invalid_override(
                "--cooldown",
                cooldown.to_string(),
                "must be a non-negative number of seconds",
            ));
        }
        settings.cooldown_secs = cooldown;
    }
    if let Some(command) = &args.power_on {
        settings.power_on_command = Some(command.clone());
    }
    if let Some(command) = &args.power_off {
        settings.power_off_command = Some(command.clone());
    }
    if let Some(command) = &args.reset_command {
        settings.reset_command = Some(command.clone());
    }
    settings.manual_power |= args.manual_power;
    settings.hardware_reset |= args.hardware_reset;
    if let Some(source) = &args.default_source {
        settings.default_source = source.clone();
    }
    if let Some(path) = &args.ref_file {
        settings.ref_file = Some(path.clone());
    }
    settings.show_reference |= args.show_reference;

    if let Some(device) = &args.serial_device {
        blueprint.serial.get_or_insert_with(Default::default).device = device.clone();
    }
    if args.reconnect_serial {
        blueprint.serial.get_or_insert_with(Default::default).reconnect = true;
    }

    let mirror = &mut blueprint.mirror;
    mirror.show_console |= args.show_console;
    mirror.show_console_diff |= args.show_console_diff;
    if let Some(path) = &args.serial_log_file {
        mirror.log_file = Some(path.clone());
    }

    for raw in &args.triggers {
        blueprint.triggers.push(parse_trigger(raw)?);
    }
    Ok(())
}

/// `<id>:<pattern>`, or a bare pattern under the id `trigger`
pub fn parse_trigger(raw: &str) -> Result<TriggerConfig, CliError> {
    let (id, pattern) = raw.split_once(':').unwrap_or((DEFAULT_TRIGGER_ID, raw));
    if id.is_empty() {
        return Err(CliError::invalid_override("--trigger", raw, "empty id"));
    }
    if pattern.is_empty() {
        return Err(CliError::invalid_override("--trigger", raw, "empty pattern"));
    }
    Ok(TriggerConfig::literal(id, pattern))
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &BootBlueprint) {
    let settings = &blueprint.settings;
    println!("\n=== Configuration Summary ===\n");
    println!("Run:");
    println!("  Iterations: {}", settings.iterations);
    println!("  Cooldown: {}s", settings.cooldown_secs);
    if settings.manual_power {
        println!("  Power: manual");
    } else {
        println!(
            "  Power on: {}",
            settings.power_on_command.as_deref().unwrap_or("-")
        );
        println!(
            "  Power off: {}",
            settings.power_off_command.as_deref().unwrap_or("-")
        );
    }
    if settings.hardware_reset {
        println!(
            "  Reset: {}",
            settings.reset_command.as_deref().unwrap_or("-")
        );
    }

    println!("\nSources:");
    if let Some(serial) = &blueprint.serial {
        println!("  - serial ({})", serial.device);
    }
    if let Some(journal) = &blueprint.journal {
        println!("  - {} ({})", journal.source, journal.command);
    }
    if let Some(signal) = &blueprint.power_signal {
        println!("  - {} ({})", signal.source, signal.command);
    }

    println!("\nTriggers ({}):", blueprint.triggers.len());
    for trigger in &blueprint.triggers {
        let pattern = trigger
            .regexp
            .as_deref()
            .or(trigger.literal_pattern())
            .unwrap_or_default();
        println!("  - {} \"{}\"", trigger.id, pattern);
    }

    if !blueprint.intervals.is_empty() {
        println!("\nIntervals ({}):", blueprint.intervals.len());
        for interval in &blueprint.intervals {
            println!("  - {}: {} -> {}", interval.id, interval.from, interval.to);
        }
    }

    for warning in config_loader::collect_warnings(blueprint) {
        println!("\n⚠ {warning}");
    }
    println!();
}
