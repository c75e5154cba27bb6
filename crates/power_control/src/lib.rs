//! # Power Control
//!
//! Power-cycle module.
//!
//! Responsibilities:
//! - Power-cycle state machine (power-on, measurement window, power-off, cooldown)
//! - Manual-power, signal-driven and hardware-reset fallbacks
//! - Iteration counting
//! - Power drivers that run the external on/off/reset actions

pub mod controller;
pub mod driver;
pub mod error;

pub use controller::{
    PowerAction, PowerCommand, PowerConfig, PowerController, PowerPhase, PROMPT_POWER_OFF,
    PROMPT_POWER_ON,
};
pub use driver::{CommandPowerDriver, MockPowerDriver, PowerDriver};
pub use error::{PowerError, Result};
