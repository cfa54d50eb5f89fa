//! Shared step generator
//!
//! The pulse steppers are polled by the step task, commanded by the control
//! tick, and halted by Stop and the limit tasks. They live in one static;
//! [`SharedSteppers`] reaches them with one short critical section per call.

use core::cell::RefCell;

use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use trifocus_core::kinematics::{Actuator, AxisSpeeds, StepCounts};
use trifocus_core::traits::StepGenerator;
use trifocus_drivers::StageSteppers;

/// The board's three pulse steppers
pub type Steppers = StageSteppers<Output<'static>, Output<'static>>;

static STEPPERS: Mutex<CriticalSectionRawMutex, RefCell<Option<Steppers>>> =
    Mutex::new(RefCell::new(None));

/// Hand the steppers over to the shared static
pub fn install(steppers: Steppers) {
    STEPPERS.lock(|cell| cell.replace(Some(steppers)));
}

/// Handle to the installed steppers
///
/// Before [`install`] every call is a no-op reporting idle actuators at 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedSteppers;

impl SharedSteppers {
    fn with<R>(&self, idle: R, f: impl FnOnce(&mut Steppers) -> R) -> R {
        STEPPERS.lock(|cell| cell.borrow_mut().as_mut().map_or(idle, f))
    }

    /// Advance pulse generation, see [`StageSteppers::poll`]
    pub fn poll(&self, elapsed_us: u32) -> u8 {
        self.with(0, |s| s.poll(elapsed_us))
    }
}

impl StepGenerator for SharedSteppers {
    fn move_to(&mut self, targets: StepCounts, speeds: AxisSpeeds) {
        self.with((), |s| s.move_to(targets, speeds))
    }

    fn run_at_speed(&mut self, actuator: Actuator, steps_per_sec: f32) {
        self.with((), |s| s.run_at_speed(actuator, steps_per_sec))
    }

    fn is_moving(&self, actuator: Actuator) -> bool {
        self.with(false, |s| s.is_moving(actuator))
    }

    fn emergency_stop(&mut self, actuator: Actuator) {
        self.with((), |s| s.emergency_stop(actuator))
    }

    fn current_position(&self, actuator: Actuator) -> i32 {
        self.with(0, |s| s.current_position(actuator))
    }

    fn set_current_position(&mut self, actuator: Actuator, steps: i32) {
        self.with((), |s| s.set_current_position(actuator, steps))
    }

    fn is_faulted(&self, actuator: Actuator) -> bool {
        self.with(false, |s| s.is_faulted(actuator))
    }

    fn stop_all(&mut self) {
        self.with((), |s| s.stop_all())
    }

    fn positions(&self) -> StepCounts {
        self.with(StepCounts::ZERO, |s| s.positions())
    }
}
