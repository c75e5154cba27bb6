//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `BootBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("bootstats.toml")).unwrap();
//! println!("Triggers: {}", blueprint.triggers.len());
//! ```

mod parser;
mod validator;

pub use contracts::BootBlueprint;
pub use parser::ConfigFormat;
pub use validator::{collect_warnings, RESERVED_IDS};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<BootBlueprint, ContractError> {
        let blueprint = Self::parse_from_path(path)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Parse configuration from file path without validating it
    ///
    /// Used when command-line overrides still have to be applied; call
    /// [`ConfigLoader::validate`] afterwards.
    pub fn parse_from_path(path: &Path) -> Result<BootBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        parser::parse(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BootBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built blueprint
    pub fn validate(blueprint: &BootBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize BootBlueprint to TOML string
    pub fn to_toml(blueprint: &BootBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize BootBlueprint to JSON string
    pub fn to_json(blueprint: &BootBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BootBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[settings]
iterations = 3
power_off_command = "relay off"
power_on_command = "relay on"

[serial]
device = "/dev/ttyUSB1"

[[triggers]]
id = "uboot"
trigger = "U-Boot"

[[triggers]]
id = "login"
trigger = "login:"
powerCycle = true

[[intervals]]
id = "boot"
from = "uboot"
to = "login"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.settings.iterations, 3);
        assert_eq!(bp.triggers.len(), 2);
        assert!(bp.triggers[1].power_cycle);
        assert_eq!(bp.serial.map(|s| s.device), Some("/dev/ttyUSB1".to_string()));
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.triggers.len(), bp2.triggers.len());
        assert_eq!(bp.triggers[0].id, bp2.triggers[0].id);
        assert_eq!(bp.intervals[0].to, bp2.intervals[0].to);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.settings.iterations, bp2.settings.iterations);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[triggers]]
id = "uboot"

[[triggers]]
id = "uboot"
trigger = "again"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_parse_from_path_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "[settings]\niterations = 2\n").unwrap();

        // No triggers yet: parses, but does not validate
        let bp = ConfigLoader::parse_from_path(&path).unwrap();
        assert_eq!(bp.settings.iterations, 2);
        assert!(ConfigLoader::load_from_path(&path).is_err());
    }
}
