//! # Contracts
//!
//! Frozen interface contracts shared by every bootstats crate: configuration
//! blueprint, event model, history, clock and the unified error type.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Host wall-clock receipt time (seconds since the UNIX epoch, f64) stamps every event
//! - All elapsed values are `event.timestamp - window_start`, never arrival order

mod blueprint;
mod clock;
mod error;
mod event;
mod history;
mod source_tag;

pub use blueprint::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::*;
pub use event::*;
pub use history::*;
pub use source_tag::SourceTag;
