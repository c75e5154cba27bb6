//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::BootBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    run: RunInfo,
    sources: Vec<SourceInfo>,
    trigger_count: usize,
    interval_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    triggers: Vec<TriggerInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    intervals: Vec<IntervalInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tasks: Vec<String>,
}

#[derive(Serialize)]
struct RunInfo {
    iterations: u32,
    cooldown_secs: f64,
    power: String,
    default_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_file: Option<String>,
}

#[derive(Serialize)]
struct SourceInfo {
    tag: String,
    kind: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct TriggerInfo {
    id: String,
    name: String,
    pattern: String,
    regexp: bool,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
    power_cycle: bool,
}

#[derive(Serialize)]
struct IntervalInfo {
    id: String,
    name: String,
    from: String,
    to: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn power_mode(blueprint: &BootBlueprint) -> String {
    let settings = &blueprint.settings;
    let mut mode = if settings.manual_power {
        "manual".to_string()
    } else if settings.power_on_command.is_some() || settings.power_off_command.is_some() {
        "commands".to_string()
    } else {
        "none".to_string()
    };
    if settings.hardware_reset {
        mode.push_str(" + hardware reset");
    }
    if blueprint.has_power_signal() {
        mode.push_str(" + power signal");
    }
    mode
}

fn build_config_info(blueprint: &BootBlueprint, args: &InfoArgs) -> ConfigInfo {
    let settings = &blueprint.settings;

    let mut sources = Vec::new();
    if let Some(serial) = &blueprint.serial {
        sources.push(SourceInfo {
            tag: contracts::SourceTag::SERIAL.to_string(),
            kind: "device",
            detail: serial.device.clone(),
        });
    }
    if let Some(journal) = &blueprint.journal {
        sources.push(SourceInfo {
            tag: journal.source.clone(),
            kind: "command",
            detail: journal.command.clone(),
        });
    }
    if let Some(signal) = &blueprint.power_signal {
        sources.push(SourceInfo {
            tag: signal.source.clone(),
            kind: "power signal",
            detail: signal.command.clone(),
        });
    }

    let triggers = if args.triggers {
        blueprint
            .triggers
            .iter()
            .map(|t| TriggerInfo {
                id: t.id.clone(),
                name: t.display_name(),
                pattern: t
                    .regexp
                    .clone()
                    .or_else(|| t.literal_pattern().map(str::to_string))
                    .unwrap_or_default(),
                regexp: t.regexp.is_some(),
                source: t
                    .source
                    .clone()
                    .unwrap_or_else(|| settings.default_source.clone()),
                before: t.before.clone(),
                after: t.after.clone(),
                power_cycle: t.power_cycle,
            })
            .collect()
    } else {
        Vec::new()
    };

    let intervals = if args.intervals {
        blueprint
            .intervals
            .iter()
            .map(|i| IntervalInfo {
                id: i.id.clone(),
                name: i.display_name(),
                from: i.from.clone(),
                to: i.to.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        run: RunInfo {
            iterations: settings.iterations,
            cooldown_secs: settings.cooldown_secs,
            power: power_mode(blueprint),
            default_source: settings.default_source.clone(),
            ref_file: settings.ref_file.as_ref().map(|p| p.display().to_string()),
        },
        sources,
        trigger_count: blueprint.triggers.len(),
        interval_count: blueprint.intervals.len(),
        triggers,
        intervals,
        tasks: blueprint.tasks.iter().map(|t| t.id.clone()).collect(),
    }
}

fn branch(i: usize, len: usize) -> &'static str {
    if i + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("bootstats configuration ({})\n", info.version);

    let run = &info.run;
    println!("Run");
    println!("   ├─ Iterations: {}", run.iterations);
    println!("   ├─ Cooldown: {}s", run.cooldown_secs);
    println!("   ├─ Power: {}", run.power);
    println!("   ├─ Default source: {}", run.default_source);
    println!(
        "   └─ Reference: {}",
        run.ref_file.as_deref().unwrap_or("(none)")
    );

    println!("\nSources ({})", info.sources.len());
    for (i, source) in info.sources.iter().enumerate() {
        println!(
            "   {} {} [{}] {}",
            branch(i, info.sources.len()),
            source.tag,
            source.kind,
            source.detail
        );
    }

    println!("\nTriggers ({})", info.trigger_count);
    for (i, trigger) in info.triggers.iter().enumerate() {
        let kind = if trigger.regexp { "regexp" } else { "literal" };
        let mut line = format!(
            "   {} {} \"{}\" ({kind}, {})",
            branch(i, info.triggers.len()),
            trigger.name,
            trigger.pattern,
            trigger.source
        );
        if let Some(before) = &trigger.before {
            line.push_str(&format!(" before {before}"));
        }
        if let Some(after) = &trigger.after {
            line.push_str(&format!(" after {after}"));
        }
        if trigger.power_cycle {
            line.push_str(" [power cycle]");
        }
        println!("{line}");
    }

    println!("\nIntervals ({})", info.interval_count);
    for (i, interval) in info.intervals.iter().enumerate() {
        println!(
            "   {} {}: {} -> {}",
            branch(i, info.intervals.len()),
            interval.name,
            interval.from,
            interval.to
        );
    }

    if !info.tasks.is_empty() {
        println!("\nTasks: {}", info.tasks.join(", "));
    }
    println!();
}
