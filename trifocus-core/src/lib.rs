//! Board-agnostic motion control for the primary mirror stage
//!
//! This crate contains everything about the stage that does not depend on
//! a particular board:
//!
//! - Kinematics (tip/tilt/focus to actuator step counts and back)
//! - The shadow/active command buffer shared with command handlers
//! - Move and homing state machines driven by the control tick
//! - Limit-switch handling
//! - Position persistence over the `trifocus-hal` flash trait
//! - Stage configuration types
//! - Hardware traits for the step generator and limit inputs
//!
//! The control tick owns [`motion::StageController`]; everything the
//! foreground may touch lives in [`command::CommandPort`].

#![no_std]
#![deny(unsafe_code)]

pub mod command;
pub mod config;
pub mod kinematics;
pub mod motion;
pub mod persistence;
pub mod state;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use kinematics::{Actuator, AxisTarget, MirrorGeometry, StepCounts};
