//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个触发点
//! - trigger / interval / task id 非空且唯一
//! - power_on / power_off 为保留 id
//! - interval id 不与触发点 id 冲突
//! - 正则表达式可编译
//! - before / after / from / to 引用存在的点
//! - iterations >= 1, cooldown / powerCycleAfter 为非负有限数

use std::collections::HashSet;
use std::time::Duration;

use contracts::{BootBlueprint, ContractError, TriggerConfig, POWER_OFF, POWER_ON};

/// 保留的合成点 id
pub const RESERVED_IDS: [&str; 2] = [POWER_ON, POWER_OFF];

/// 校验 BootBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    validate_settings(blueprint)?;
    validate_trigger_ids(blueprint)?;
    validate_trigger_patterns(blueprint)?;
    validate_trigger_policies(blueprint)?;
    validate_ordering_gates(blueprint)?;
    validate_intervals(blueprint)?;
    validate_task_ids(blueprint)?;
    Ok(())
}

/// 校验运行参数
fn validate_settings(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    let settings = &blueprint.settings;

    if settings.iterations == 0 {
        return Err(ContractError::config_validation(
            "settings.iterations",
            "iterations must be >= 1",
        ));
    }

    if !is_duration(settings.cooldown_secs) {
        return Err(ContractError::config_validation(
            "settings.cooldown_secs",
            format!(
                "cooldown_secs must be a non-negative number of seconds, got {}",
                settings.cooldown_secs
            ),
        ));
    }

    if settings.default_source.is_empty() {
        return Err(ContractError::config_validation(
            "settings.default_source",
            "default_source cannot be empty",
        ));
    }

    Ok(())
}

/// 校验触发点 id 唯一性
fn validate_trigger_ids(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    if blueprint.triggers.is_empty() {
        return Err(ContractError::config_validation(
            "triggers",
            "no trigger points configured",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, trigger) in blueprint.triggers.iter().enumerate() {
        if trigger.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("triggers[{idx}].id"),
                "trigger id cannot be empty",
            ));
        }
        if RESERVED_IDS.contains(&trigger.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("triggers[id={}]", trigger.id),
                "id is reserved for a synthetic power point",
            ));
        }
        if !seen.insert(trigger.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("triggers[id={}]", trigger.id),
                "duplicate trigger id",
            ));
        }
    }
    Ok(())
}

/// 校验匹配模式
fn validate_trigger_patterns(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    for trigger in &blueprint.triggers {
        if let Some(pattern) = &trigger.trigger {
            if pattern.is_empty() {
                return Err(ContractError::config_validation(
                    format!("triggers[{}].trigger", trigger.id),
                    "literal trigger cannot be empty",
                ));
            }
        }
        if let Some(pattern) = &trigger.regexp {
            regex::bytes::Regex::new(pattern).map_err(|e| {
                ContractError::config_validation(
                    format!("triggers[{}].regexp", trigger.id),
                    format!("invalid regular expression: {e}"),
                )
            })?;
        }
        if !is_duration(trigger.power_cycle_after) {
            return Err(ContractError::config_validation(
                format!("triggers[{}].powerCycleAfter", trigger.id),
                format!(
                    "powerCycleAfter must be a non-negative number of seconds, got {}",
                    trigger.power_cycle_after
                ),
            ));
        }
    }
    Ok(())
}

/// 非负、有限且能表示为 `Duration`
fn is_duration(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

/// 校验重复匹配策略互斥
fn validate_trigger_policies(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    for trigger in &blueprint.triggers {
        if trigger.multi_trigger && trigger.ignore_multiple_trigger {
            return Err(ContractError::config_validation(
                format!("triggers[{}]", trigger.id),
                "multi_trigger and ignore_multiple_trigger are mutually exclusive",
            ));
        }
    }
    Ok(())
}

/// 校验 before / after 引用
fn validate_ordering_gates(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    for trigger in &blueprint.triggers {
        for (field, target) in [("before", &trigger.before), ("after", &trigger.after)] {
            let Some(target) = target else { continue };
            if !is_known_point(blueprint, target) {
                return Err(ContractError::config_validation(
                    format!("triggers[{}].{field}", trigger.id),
                    format!("unknown point '{target}'"),
                ));
            }
            if target == &trigger.id {
                return Err(ContractError::config_validation(
                    format!("triggers[{}].{field}", trigger.id),
                    "a point cannot gate itself",
                ));
            }
        }
    }
    Ok(())
}

/// 校验区间
fn validate_intervals(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, interval) in blueprint.intervals.iter().enumerate() {
        if interval.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("intervals[{idx}].id"),
                "interval id cannot be empty",
            ));
        }
        if RESERVED_IDS.contains(&interval.id.as_str())
            || blueprint.trigger(&interval.id).is_some()
        {
            return Err(ContractError::config_validation(
                format!("intervals[id={}]", interval.id),
                "interval id collides with a point id",
            ));
        }
        if !seen.insert(interval.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("intervals[id={}]", interval.id),
                "duplicate interval id",
            ));
        }
        for (field, endpoint) in [("from", &interval.from), ("to", &interval.to)] {
            if !is_interval_endpoint(blueprint, endpoint) {
                return Err(ContractError::config_validation(
                    format!("intervals[{}].{field}", interval.id),
                    format!("unknown point '{endpoint}'"),
                ));
            }
        }
    }
    Ok(())
}

/// 校验 task id 唯一性
fn validate_task_ids(blueprint: &BootBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, task) in blueprint.tasks.iter().enumerate() {
        if task.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("tasks[{idx}].id"),
                "task id cannot be empty",
            ));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("tasks[id={}]", task.id),
                "duplicate task id",
            ));
        }
    }
    Ok(())
}

fn is_known_point(blueprint: &BootBlueprint, id: &str) -> bool {
    RESERVED_IDS.contains(&id) || blueprint.trigger(id).is_some()
}

/// Declared point, synthetic point, or `<id>_<n>` (n >= 2) of a multi_trigger point
fn is_interval_endpoint(blueprint: &BootBlueprint, id: &str) -> bool {
    if is_known_point(blueprint, id) {
        return true;
    }
    let Some((base, suffix)) = id.rsplit_once('_') else {
        return false;
    };
    let numbered = suffix.parse::<u32>().map(|n| n >= 2).unwrap_or(false);
    numbered
        && blueprint
            .trigger(base)
            .map(|t: &TriggerConfig| t.multi_trigger)
            .unwrap_or(false)
}

/// 收集非致命的配置问题
pub fn collect_warnings(blueprint: &BootBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let settings = &blueprint.settings;

    if settings.manual_power && !blueprint.has_power_signal() {
        warnings.push(
            "manual_power without a power_signal source: iterations only advance on power-state signals"
                .to_string(),
        );
    }

    let can_restart = settings.manual_power
        || settings.power_off_command.is_some()
        || settings.hardware_reset;
    if !can_restart {
        warnings.push(
            "no power_off_command, manual_power or hardware_reset: the run will abort when the first iteration completes"
                .to_string(),
        );
    }

    if settings.hardware_reset && settings.reset_command.is_none() {
        warnings.push("hardware_reset is set but no reset_command is configured".to_string());
    }

    if blueprint.serial.is_none() {
        warnings.push("no serial source configured".to_string());
    }

    let sources_present: HashSet<&str> = blueprint
        .serial
        .iter()
        .map(|_| contracts::SourceTag::SERIAL)
        .chain(blueprint.journal.iter().map(|j| j.source.as_str()))
        .collect();
    for trigger in &blueprint.triggers {
        let source = trigger
            .source
            .as_deref()
            .unwrap_or(settings.default_source.as_str());
        if !sources_present.contains(source) && !source.starts_with("task_") {
            warnings.push(format!(
                "trigger '{}' listens on source '{source}', which no configured adapter provides",
                trigger.id
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{IntervalConfig, RunSettings, SerialSourceConfig, TaskConfig};

    fn minimal_blueprint() -> BootBlueprint {
        BootBlueprint {
            settings: RunSettings {
                power_off_command: Some("off".into()),
                ..Default::default()
            },
            serial: Some(SerialSourceConfig::default()),
            triggers: vec![
                TriggerConfig::literal("start", "START"),
                TriggerConfig::literal("done", "DONE"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&minimal_blueprint()).is_ok());
        assert!(collect_warnings(&minimal_blueprint()).is_empty());
    }

    #[test]
    fn test_no_triggers() {
        let bp = BootBlueprint::default();
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("no trigger points"));
    }

    #[test]
    fn test_reserved_id() {
        let mut bp = minimal_blueprint();
        bp.triggers.push(TriggerConfig::literal("power_on", "x"));
        assert!(validate(&bp).unwrap_err().to_string().contains("reserved"));
    }

    #[test]
    fn test_zero_iterations() {
        let mut bp = minimal_blueprint();
        bp.settings.iterations = 0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_negative_cooldown() {
        let mut bp = minimal_blueprint();
        bp.settings.cooldown_secs = -1.0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_durations_out_of_range() {
        let mut bp = minimal_blueprint();
        bp.settings.cooldown_secs = 1e20;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("cooldown_secs"));

        let mut bp = minimal_blueprint();
        bp.triggers[1].power_cycle = true;
        bp.triggers[1].power_cycle_after = 1e20;
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("powerCycleAfter"));

        bp.triggers[1].power_cycle_after = f64::NAN;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_bad_regexp() {
        let mut bp = minimal_blueprint();
        bp.triggers[0].regexp = Some("(unclosed".into());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("invalid regular expression"));
    }

    #[test]
    fn test_unknown_gate_target() {
        let mut bp = minimal_blueprint();
        bp.triggers[1].after = Some("nowhere".into());
        assert!(validate(&bp).unwrap_err().to_string().contains("nowhere"));
    }

    #[test]
    fn test_conflicting_policies() {
        let mut bp = minimal_blueprint();
        bp.triggers[0].multi_trigger = true;
        bp.triggers[0].ignore_multiple_trigger = true;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_interval_endpoints() {
        let mut bp = minimal_blueprint();
        bp.intervals.push(IntervalConfig {
            id: "total".into(),
            name: None,
            from: "power_on".into(),
            to: "done".into(),
        });
        assert!(validate(&bp).is_ok());

        // Suffixed endpoints only for multi_trigger points
        bp.intervals.push(IntervalConfig {
            id: "second".into(),
            name: None,
            from: "start".into(),
            to: "done_2".into(),
        });
        assert!(validate(&bp).is_err());
        bp.triggers[1].multi_trigger = true;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_interval_id_collision() {
        let mut bp = minimal_blueprint();
        bp.intervals.push(IntervalConfig {
            id: "start".into(),
            name: None,
            from: "start".into(),
            to: "done".into(),
        });
        assert!(validate(&bp).unwrap_err().to_string().contains("collides"));
    }

    #[test]
    fn test_duplicate_task() {
        let mut bp = minimal_blueprint();
        bp.tasks.push(TaskConfig {
            id: "heartbeat".into(),
            ..Default::default()
        });
        bp.tasks.push(TaskConfig {
            id: "heartbeat".into(),
            ..Default::default()
        });
        assert!(validate(&bp).unwrap_err().to_string().contains("duplicate task"));
    }

    #[test]
    fn test_warnings() {
        let mut bp = minimal_blueprint();
        bp.settings.power_off_command = None;
        bp.settings.manual_power = true;
        bp.triggers[0].source = Some("journald".into());
        let warnings = collect_warnings(&bp);
        assert!(warnings.iter().any(|w| w.contains("power_signal")));
        assert!(warnings.iter().any(|w| w.contains("journald")));
        assert!(!warnings.iter().any(|w| w.contains("abort")));
    }
}
