//! Mock pins for driver tests

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use embedded_hal_async::digital::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault;

impl digital::Error for PinFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin that records its level and rising edges
#[derive(Debug, Default)]
pub struct MockPin {
    high: bool,
    rising: u32,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn rising_edges(&self) -> u32 {
        self.rising
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.high {
            self.rising += 1;
        }
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }
}

/// Output pin whose writes always fail
#[derive(Debug)]
pub struct FailingPin;

impl ErrorType for FailingPin {
    type Error = PinFault;
}

impl OutputPin for FailingPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(PinFault)
    }
}

/// Input pin with a scripted level
///
/// Each wait takes the queued level, if any, and resolves at once.
#[derive(Debug)]
pub struct MockInput {
    high: bool,
    queued: Option<bool>,
    failing: bool,
}

impl MockInput {
    pub fn new(high: bool) -> Self {
        Self {
            high,
            queued: None,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(false)
        }
    }

    /// Level the next wait switches to
    pub fn queue(&mut self, high: bool) {
        self.queued = Some(high);
    }

    fn apply_queued(&mut self) -> Result<(), PinFault> {
        if self.failing {
            return Err(PinFault);
        }
        if let Some(high) = self.queued.take() {
            self.high = high;
        }
        Ok(())
    }
}

impl ErrorType for MockInput {
    type Error = PinFault;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        if self.failing {
            return Err(PinFault);
        }
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl Wait for MockInput {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.apply_queued()
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        self.apply_queued()
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.apply_queued()
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        self.apply_queued()
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.apply_queued()
    }
}

/// PWM channel that records the duty cycle
#[derive(Debug)]
pub struct MockPwm {
    pub duty: u16,
    max: u16,
}

impl MockPwm {
    pub fn new(max: u16) -> Self {
        Self { duty: 0, max }
    }
}

impl pwm::ErrorType for MockPwm {
    type Error = core::convert::Infallible;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        Ok(())
    }
}
