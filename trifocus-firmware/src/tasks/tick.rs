//! Control tick task
//!
//! Runs [`StageController::tick`] at the configured period on its own
//! interrupt executor, logs state changes, and hands finished positions to
//! the persistence task.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};

use trifocus_core::motion::StageController;

use crate::channels::{PORT, SAVE_POSITIONS, SWITCH_LEVELS};
use crate::stepgen::SharedSteppers;

#[embassy_executor::task]
pub async fn tick_task(mut controller: StageController, period: Duration) {
    info!("Tick task started, period {} us", period.as_micros());

    let mut steppers = SharedSteppers;
    let mut ticker = Ticker::every(period);
    let start = Instant::now();

    let mut last_state = controller.state();
    let mut last_homing = controller.homing_state();
    let mut last_fault = controller.fault();

    loop {
        ticker.next().await;

        let now_ms = start.elapsed().as_millis() as u32;
        controller.tick(&PORT, &mut steppers, &SWITCH_LEVELS, now_ms);

        if controller.state() != last_state {
            last_state = controller.state();
            debug!("Move state: {}", last_state.name());
        }
        if controller.homing_state() != last_homing {
            last_homing = controller.homing_state();
            debug!("Homing state: {}", last_homing.name());
        }
        if controller.fault() != last_fault {
            last_fault = controller.fault();
            match last_fault {
                Some(fault) => warn!("Stage fault: {:?} ({=u8:#x})", fault, fault.code()),
                None => info!("Stage fault cleared"),
            }
        }

        if let Some(counts) = controller.take_pending_save() {
            SAVE_POSITIONS.signal(counts);
        }
    }
}
