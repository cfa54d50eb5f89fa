//! Hardware drivers for the mirror stage
//!
//! Implementations of the `trifocus-core` hardware traits over
//! embedded-hal 1.0 pins:
//!
//! - Step/direction pulse generation for the three actuators
//! - Home limit switch inputs
//! - Driver enable line
//! - Cooling fan PWM

#![no_std]
#![deny(unsafe_code)]

pub mod enable;
pub mod fan;
pub mod limit;
pub mod stepper;

#[cfg(test)]
pub(crate) mod testing;

pub use enable::DriverEnable;
pub use fan::Fan;
pub use limit::{LimitSwitch, SwitchLevels, SwitchPolarity};
pub use stepper::{PulseStepper, StageSteppers};
