//! Limit switch tasks
//!
//! One task per home switch. Each keeps [`SWITCH_LEVELS`] current and, on
//! the asserting edge, latches the limit flag and halts that actuator
//! without waiting for the next control tick.

use defmt::*;
use embassy_rp::gpio::Input;

use trifocus_core::kinematics::Actuator;
use trifocus_core::motion::on_limit_switch;
use trifocus_drivers::LimitSwitch;

use crate::channels::{PORT, SWITCH_LEVELS};
use crate::stepgen::SharedSteppers;

#[embassy_executor::task(pool_size = 3)]
pub async fn limit_task(actuator: Actuator, mut switch: LimitSwitch<Input<'static>>) {
    let mut steppers = SharedSteppers;

    let mut asserted = switch.is_asserted();
    SWITCH_LEVELS.set(actuator, asserted);
    info!("Limit switch {} started, pressed={}", actuator.name(), asserted);

    loop {
        let now_asserted = switch.wait_for_change().await;
        SWITCH_LEVELS.set(actuator, now_asserted);

        if now_asserted && !asserted {
            on_limit_switch(PORT.limits(), &mut steppers, actuator);
            debug!("Limit switch {} pressed", actuator.name());
        }
        asserted = now_asserted;
    }
}
