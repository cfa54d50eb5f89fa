//! Stage state machine
//!
//! Defines the authoritative motion status of the stage.
//! The machine is explicit, finite, and deterministic.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::{Fault, HomingState, MoveState};
