//! Motion sequencing
//!
//! The control tick's side of the stage: the move and homing state
//! machines and the limit-switch handler.

pub mod controller;
pub mod homing;
pub mod limits;

pub use controller::StageController;
pub use homing::{HomingProgress, HomingSequence};
pub use limits::{on_limit_switch, LimitFlags};
