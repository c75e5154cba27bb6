//! 上下电状态机
//!
//! `Idle → PoweringOn → Measuring → PoweringOff → Cooldown → PoweringOn → … → Finished`
//!
//! 控制器本身不执行任何 I/O：每个操作返回一组 `PowerAction`，由协调器按顺序执行。

use std::fmt;
use std::time::Duration;

use contracts::{BootBlueprint, ContractError, PowerState};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;

/// Operator prompt before powering on in manual mode
pub const PROMPT_POWER_ON: &str = "you can turn on the device now";
/// Operator prompt after an iteration completes in manual mode
pub const PROMPT_POWER_OFF: &str = "you can turn off the device now";

/// External power action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerCommand {
    On,
    Off,
    /// Hardware reset signal sequence instead of a power-on
    Reset,
}

impl fmt::Display for PowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "power-on",
            Self::Off => "power-off",
            Self::Reset => "reset",
        })
    }
}

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerPhase {
    Idle,
    /// Power requested, waiting for the `On` signal
    PoweringOn,
    /// Measurement window open
    Measuring,
    /// Power-off requested, waiting for the `Off` signal
    PoweringOff,
    /// Waiting for the next scheduled start
    Cooldown,
    Finished,
}

/// What the coordinator must do, in order
///
/// `at` on a window edge is the controller's `now` (or the signal time); an
/// edge that follows a `Command` is restamped once the command returns.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerAction {
    Command(PowerCommand),
    Prompt(&'static str),
    OpenWindow { at: f64 },
    CloseWindow { at: f64, counted: bool },
    /// Call `start_scheduled` after `after`
    ScheduleStart { after: Duration },
    Finished,
}

/// Power control knobs, taken from the run settings
#[derive(Debug, Clone, PartialEq)]
pub struct PowerConfig {
    pub iterations: u32,
    pub cooldown: Duration,
    pub has_on_command: bool,
    pub has_off_command: bool,
    pub manual: bool,
    pub hardware_reset: bool,
    /// A digital power-state source reports On/Off transitions
    pub has_power_signal: bool,
}

impl PowerConfig {
    pub fn from_blueprint(blueprint: &BootBlueprint) -> Self {
        let settings = &blueprint.settings;
        Self {
            iterations: settings.iterations.max(1),
            cooldown: settings.cooldown(),
            has_on_command: settings.power_on_command.is_some(),
            has_off_command: settings.power_off_command.is_some(),
            manual: settings.manual_power,
            hardware_reset: settings.hardware_reset,
            has_power_signal: blueprint.has_power_signal(),
        }
    }

    /// Some way to end an iteration and start the next one exists
    pub fn can_restart(&self) -> bool {
        (self.has_off_command && !self.manual)
            || self.manual
            || (self.hardware_reset && !self.has_power_signal)
    }
}

/// Power-cycle controller
#[derive(Debug)]
pub struct PowerController {
    config: PowerConfig,
    phase: PowerPhase,
    /// Counted iterations
    completed: u32,
    /// Last observed supply state (signal source only)
    powered: Option<PowerState>,
}

impl PowerController {
    pub fn new(config: PowerConfig) -> Self {
        Self {
            config,
            phase: PowerPhase::Idle,
            completed: 0,
            powered: None,
        }
    }

    pub fn phase(&self) -> PowerPhase {
        self.phase
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.phase == PowerPhase::Finished
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// Start the run once every mandatory source is ready
    #[instrument(level = "debug", name = "power_begin", skip(self))]
    pub fn begin(&mut self, now: f64) -> Vec<PowerAction> {
        if self.phase != PowerPhase::Idle {
            debug!(phase = ?self.phase, "begin ignored");
            return Vec::new();
        }
        if self.config.has_off_command && !self.config.manual {
            // Start from a known unpowered state
            let mut actions = vec![PowerAction::Command(PowerCommand::Off)];
            self.schedule_start(now, &mut actions);
            actions
        } else {
            self.power_on(now)
        }
    }

    /// Power the target on and open (or arm) the measurement window
    #[instrument(level = "debug", name = "power_on", skip(self))]
    pub fn power_on(&mut self, now: f64) -> Vec<PowerAction> {
        let mut actions = Vec::new();
        self.push_power_on(now, &mut actions);
        actions
    }

    /// Scheduled start fired
    pub fn start_scheduled(&mut self, now: f64) -> Vec<PowerAction> {
        if self.phase != PowerPhase::Cooldown {
            debug!(phase = ?self.phase, "stale scheduled start ignored");
            return Vec::new();
        }
        self.power_on(now)
    }

    /// The iteration is complete; end the window
    ///
    /// # Errors
    /// `NoRestartMethod` when no off command, manual mode or usable hardware reset exists.
    #[instrument(level = "debug", name = "power_request_off", skip(self))]
    pub fn request_power_off(&mut self, now: f64, had_match: bool) -> Result<Vec<PowerAction>> {
        if self.phase != PowerPhase::Measuring {
            debug!(phase = ?self.phase, "power-off already in progress");
            return Ok(Vec::new());
        }

        let mut actions = Vec::new();
        if self.config.has_off_command && !self.config.manual {
            actions.push(PowerAction::Command(PowerCommand::Off));
            self.phase = PowerPhase::PoweringOff;
            if !self.config.has_power_signal {
                self.close_window(now, had_match, false, &mut actions);
            }
        } else if self.config.manual {
            warn!("{PROMPT_POWER_OFF}");
            actions.push(PowerAction::Prompt(PROMPT_POWER_OFF));
            self.phase = PowerPhase::PoweringOff;
            if !self.config.has_power_signal {
                // Nothing will report the transition
                self.close_window(now, had_match, false, &mut actions);
            }
        } else if self.config.hardware_reset && !self.config.has_power_signal {
            debug!("simulating power-off for hardware reset");
            self.close_window(now, had_match, true, &mut actions);
        } else {
            return Err(ContractError::NoRestartMethod.into());
        }
        Ok(actions)
    }

    /// Digital power-state transition observed at `timestamp`
    #[instrument(level = "debug", name = "power_signal", skip(self))]
    pub fn on_power_signal(
        &mut self,
        state: PowerState,
        timestamp: f64,
        had_match: bool,
    ) -> Vec<PowerAction> {
        self.powered = Some(state);
        let mut actions = Vec::new();
        match (state, self.phase) {
            (PowerState::On, PowerPhase::PoweringOn) => {
                info!("power is on");
                self.open_window(timestamp, &mut actions);
            }
            (PowerState::Off, PowerPhase::Measuring | PowerPhase::PoweringOff) => {
                info!("power is off");
                self.close_window(timestamp, had_match, false, &mut actions);
            }
            (state, phase) => {
                debug!(?state, ?phase, "unexpected power state change");
            }
        }
        actions
    }

    /// Last observed supply state
    pub fn powered(&self) -> Option<PowerState> {
        self.powered
    }

    fn push_power_on(&mut self, now: f64, actions: &mut Vec<PowerAction>) {
        let config = &self.config;
        let mut reset = false;
        if config.manual {
            warn!("{PROMPT_POWER_ON}");
            actions.push(PowerAction::Prompt(PROMPT_POWER_ON));
        } else if config.hardware_reset && !config.has_on_command {
            info!("will reboot using the reset sequence");
            actions.push(PowerAction::Command(PowerCommand::Reset));
            reset = true;
        } else if config.has_on_command {
            debug!("powering on");
            actions.push(PowerAction::Command(PowerCommand::On));
        }

        // A reset does not toggle the supply, so no signal will follow
        if self.config.has_power_signal && !reset {
            self.phase = PowerPhase::PoweringOn;
        } else {
            self.open_window(now, actions);
        }
    }

    fn open_window(&mut self, at: f64, actions: &mut Vec<PowerAction>) {
        self.phase = PowerPhase::Measuring;
        actions.push(PowerAction::OpenWindow { at });
    }

    fn close_window(
        &mut self,
        at: f64,
        had_match: bool,
        immediate_restart: bool,
        actions: &mut Vec<PowerAction>,
    ) {
        actions.push(PowerAction::CloseWindow {
            at,
            counted: had_match,
        });

        if !had_match {
            info!("nothing measured, will ignore power cycle");
            metrics::counter!("bootstats_iterations_total", "status" => "spurious").increment(1);
            self.schedule_start(at, actions);
            return;
        }

        self.completed += 1;
        info!("iteration {} done", self.completed);
        metrics::counter!("bootstats_iterations_total", "status" => "completed").increment(1);

        if self.completed >= self.config.iterations {
            self.phase = PowerPhase::Finished;
            actions.push(PowerAction::Finished);
        } else if immediate_restart {
            self.push_power_on(at, actions);
        } else {
            self.schedule_start(at, actions);
        }
    }

    fn schedule_start(&mut self, now: f64, actions: &mut Vec<PowerAction>) {
        if self.config.cooldown.is_zero() {
            self.push_power_on(now, actions);
        } else {
            self.phase = PowerPhase::Cooldown;
            actions.push(PowerAction::ScheduleStart {
                after: self.config.cooldown,
            });
        }
    }
}
