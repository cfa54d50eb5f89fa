//! Stepper driver enable line

use embedded_hal::digital::OutputPin;

/// Shared EN input of the stepper drivers
///
/// Most STEP/DIR drivers are enabled with EN low.
pub struct DriverEnable<P> {
    pin: P,
    active_low: bool,
    enabled: bool,
}

impl<P: OutputPin> DriverEnable<P> {
    /// Create with the drivers disabled
    pub fn new(pin: P, active_low: bool) -> Result<Self, P::Error> {
        let mut enable = Self {
            pin,
            active_low,
            enabled: true,
        };
        enable.set_enabled(false)?;
        Ok(enable)
    }

    /// Energize or release the motors
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), P::Error> {
        if enabled != self.active_low {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPin;

    #[test]
    fn test_active_low_starts_disabled() {
        let enable = DriverEnable::new(MockPin::new(), true).unwrap();
        assert!(!enable.is_enabled());
        assert!(enable.pin.is_high());
    }

    #[test]
    fn test_enable_drives_pin() {
        let mut enable = DriverEnable::new(MockPin::new(), true).unwrap();
        enable.set_enabled(true).unwrap();
        assert!(enable.is_enabled());
        assert!(!enable.pin.is_high());

        let mut active_high = DriverEnable::new(MockPin::new(), false).unwrap();
        assert!(!active_high.pin.is_high());
        active_high.set_enabled(true).unwrap();
        assert!(active_high.pin.is_high());
    }
}
