//! Hardware abstraction traits
//!
//! These traits define the interface between the stage logic and the
//! hardware that moves and senses the actuators.

pub mod limit;
pub mod status;
pub mod stepper;

pub use limit::LimitInputs;
pub use status::{FieldValue, StatusReport};
pub use stepper::StepGenerator;
