//! Power drivers
//!
//! Execute the `PowerCommand`s the controller asks for.

use std::sync::{Arc, Mutex, PoisonError};

use contracts::RunSettings;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::controller::PowerCommand;
use crate::error::{PowerError, Result};

/// Power driver trait
///
/// Abstracts the hardware side for testing and replacement.
#[trait_variant::make(PowerDriver: Send)]
pub trait LocalPowerDriver {
    /// Driver name (used for logging)
    fn name(&self) -> &str;

    /// Run one power action
    ///
    /// # Errors
    /// Spawn failure or non-zero exit; the caller decides whether that is fatal.
    async fn execute(&mut self, command: PowerCommand) -> Result<()>;
}

/// Runs configured shell commands through `sh -c`
#[derive(Debug, Clone, Default)]
pub struct CommandPowerDriver {
    on: Option<String>,
    off: Option<String>,
    reset: Option<String>,
}

impl CommandPowerDriver {
    pub fn new(on: Option<String>, off: Option<String>, reset: Option<String>) -> Self {
        Self { on, off, reset }
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(
            settings.power_on_command.clone(),
            settings.power_off_command.clone(),
            settings.reset_command.clone(),
        )
    }

    fn shell_for(&self, command: PowerCommand) -> Option<&str> {
        match command {
            PowerCommand::On => self.on.as_deref(),
            PowerCommand::Off => self.off.as_deref(),
            PowerCommand::Reset => self.reset.as_deref(),
        }
    }
}

impl PowerDriver for CommandPowerDriver {
    fn name(&self) -> &str {
        "shell"
    }

    #[instrument(name = "power_execute", skip(self))]
    async fn execute(&mut self, command: PowerCommand) -> Result<()> {
        let shell = self
            .shell_for(command)
            .ok_or(PowerError::NotConfigured(command))?
            .to_string();
        metrics::counter!("bootstats_power_commands_total", "command" => command.to_string())
            .increment(1);
        debug!(%command, %shell, "running power command");

        let status = Command::new("sh")
            .arg("-c")
            .arg(&shell)
            .status()
            .await
            .map_err(|source| PowerError::Spawn {
                command,
                shell: shell.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(PowerError::Failed {
                command,
                shell,
                status,
            })
        }
    }
}

/// Records every command; used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MockPowerDriver {
    calls: Arc<Mutex<Vec<PowerCommand>>>,
    fail: bool,
}

impl MockPowerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command reports `NotConfigured`
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Commands executed so far (clones share the log)
    pub fn calls(&self) -> Vec<PowerCommand> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PowerDriver for MockPowerDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&mut self, command: PowerCommand) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        if self.fail {
            return Err(PowerError::NotConfigured(command));
        }
        debug!(%command, "mock power command");
        Ok(())
    }
}
