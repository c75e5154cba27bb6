//! Built-in event sources

mod command;
mod device;
mod scripted;

pub use command::{CommandMode, CommandSource};
pub use device::{DeviceLineSource, STDIN_DEVICE};
pub use scripted::{ScriptStep, ScriptedSource};
