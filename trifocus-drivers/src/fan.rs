//! Cooling fan on a PWM output

use embedded_hal::pwm::SetDutyCycle;

/// PWM fan driven by percentage
pub struct Fan<P> {
    pwm: P,
    percent: u8,
}

impl<P: SetDutyCycle> Fan<P> {
    /// Create with the fan off
    pub fn new(pwm: P) -> Result<Self, P::Error> {
        let mut fan = Self { pwm, percent: 0 };
        fan.set_percent(0)?;
        Ok(fan)
    }

    /// Set speed in percent; values above 100 run at full speed
    pub fn set_percent(&mut self, percent: u8) -> Result<(), P::Error> {
        let percent = percent.min(100);
        self.pwm.set_duty_cycle_percent(percent)?;
        self.percent = percent;
        Ok(())
    }

    /// Last speed set
    pub fn percent(&self) -> u8 {
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPwm;

    #[test]
    fn test_starts_off() {
        let fan = Fan::new(MockPwm::new(1000)).unwrap();
        assert_eq!(fan.percent(), 0);
        assert_eq!(fan.pwm.duty, 0);
    }

    #[test]
    fn test_percent_scales_duty() {
        let mut fan = Fan::new(MockPwm::new(1000)).unwrap();
        fan.set_percent(40).unwrap();
        assert_eq!(fan.pwm.duty, 400);

        fan.set_percent(250).unwrap();
        assert_eq!(fan.percent(), 100);
        assert_eq!(fan.pwm.duty, 1000);
    }
}
