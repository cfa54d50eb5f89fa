//! Step/direction stepper drivers

pub mod pulse;
pub mod stage;

pub use pulse::{PulseMode, PulseStepper};
pub use stage::StageSteppers;
