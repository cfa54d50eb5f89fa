//! Home limit switches
//!
//! [`LimitSwitch`] reads one switch through an embedded-hal input and
//! waits for its edges. [`SwitchLevels`] caches the last level of all three
//! so the control tick can read them without owning the pins.

use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use portable_atomic::{AtomicBool, Ordering};
use trifocus_core::kinematics::Actuator;
use trifocus_core::traits::LimitInputs;

/// Electrical level of a pressed switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchPolarity {
    /// Pressed pulls the input low (normally open to ground with pull-up)
    #[default]
    ActiveLow,
    /// Pressed drives the input high
    ActiveHigh,
}

/// One limit switch input
pub struct LimitSwitch<P> {
    pin: P,
    polarity: SwitchPolarity,
}

impl<P: InputPin> LimitSwitch<P> {
    pub fn new(pin: P, polarity: SwitchPolarity) -> Self {
        Self { pin, polarity }
    }

    /// Check if the switch is pressed
    ///
    /// A failed read counts as pressed.
    pub fn is_asserted(&mut self) -> bool {
        let level = match self.polarity {
            SwitchPolarity::ActiveLow => self.pin.is_low(),
            SwitchPolarity::ActiveHigh => self.pin.is_high(),
        };
        level.unwrap_or(true)
    }
}

impl<P: InputPin + Wait> LimitSwitch<P> {
    /// Wait for the next edge and return the new level
    pub async fn wait_for_change(&mut self) -> bool {
        if self.pin.wait_for_any_edge().await.is_err() {
            return true;
        }
        self.is_asserted()
    }

    /// Wait until the switch is pressed
    ///
    /// Returns immediately if it already is.
    pub async fn wait_for_assert(&mut self) {
        // A wait error falls through, the caller reads the level next
        let _ = match self.polarity {
            SwitchPolarity::ActiveLow => self.pin.wait_for_low().await,
            SwitchPolarity::ActiveHigh => self.pin.wait_for_high().await,
        };
    }
}

/// Last known level of each limit switch
///
/// Written by the switch tasks, read by the control tick.
pub struct SwitchLevels {
    levels: [AtomicBool; 3],
}

impl Default for SwitchLevels {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchLevels {
    pub const fn new() -> Self {
        Self {
            levels: [
                AtomicBool::new(false),
                AtomicBool::new(false),
                AtomicBool::new(false),
            ],
        }
    }

    /// Record a switch level
    pub fn set(&self, actuator: Actuator, asserted: bool) {
        self.levels[actuator.index()].store(asserted, Ordering::Release);
    }

    /// Copy of all three levels
    pub fn snapshot(&self) -> [bool; 3] {
        Actuator::ALL.map(|a| self.is_asserted(a))
    }
}

impl LimitInputs for SwitchLevels {
    fn is_asserted(&self, actuator: Actuator) -> bool {
        self.levels[actuator.index()].load(Ordering::Acquire)
    }
}
