//! Compiled trigger points

use std::time::Duration;

use contracts::{ContractError, MultiMatchPolicy, SourceTag, TriggerConfig};
use memchr::memmem;
use regex::bytes::Regex;

/// A trigger point ready for matching
#[derive(Debug, Clone)]
pub struct CompiledPoint {
    pub id: String,
    pub name: String,
    literal: Option<Vec<u8>>,
    regexp: Option<Regex>,
    source: Option<SourceTag>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub policy: MultiMatchPolicy,
    pub power_cycle: bool,
    pub power_cycle_after: Duration,
    pub start_task: Option<String>,
    pub stop_task: Option<String>,
    /// Declared id this point duplicates (suffixed points only)
    pub duplicate_of: Option<String>,
}

impl CompiledPoint {
    pub fn compile(config: &TriggerConfig) -> Result<Self, ContractError> {
        let regexp = config
            .regexp
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
                    ContractError::config_validation(
                        format!("triggers[{}].regexp", config.id),
                        format!("invalid regular expression: {e}"),
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            id: config.id.clone(),
            name: config.display_name(),
            literal: config.literal_pattern().map(|p| p.as_bytes().to_vec()),
            regexp,
            source: config.source.as_deref().map(SourceTag::new),
            before: config.before.clone(),
            after: config.after.clone(),
            policy: config.policy(),
            power_cycle: config.power_cycle,
            power_cycle_after: config.power_cycle_delay(),
            start_task: config.start_task.clone(),
            stop_task: config.stop_task.clone(),
            duplicate_of: None,
        })
    }

    /// Copy of this point recorded as `<id>_<n>`
    pub fn suffixed(&self, n: u32) -> Self {
        Self {
            id: suffixed_id(&self.id, n),
            name: format!("{} {n}", self.name),
            duplicate_of: Some(self.id.clone()),
            ..self.clone()
        }
    }

    /// Points without an explicit source only see the default source
    pub fn accepts_source(&self, source: &SourceTag, default_source: &SourceTag) -> bool {
        match &self.source {
            Some(wanted) => wanted == source,
            None => source == default_source,
        }
    }

    /// Literal containment or start-anchored regular expression
    pub fn matches(&self, payload: &[u8]) -> bool {
        let literal_hit = self
            .literal
            .as_deref()
            .is_some_and(|lit| memmem::find(payload, lit).is_some());
        literal_hit || self.regexp.as_ref().is_some_and(|re| re.is_match(payload))
    }
}

pub fn suffixed_id(id: &str, n: u32) -> String {
    format!("{id}_{n}")
}
