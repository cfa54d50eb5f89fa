//! Step pulse task
//!
//! Polls the pulse steppers at a fixed rate. Each poll raises or drops at
//! most one pin per actuator, so the top step rate is half the poll rate.

use embassy_time::{Duration, Instant, Ticker};

use crate::stepgen::SharedSteppers;

/// Pulse poll period in microseconds (10 kHz top step rate)
pub const STEP_POLL_US: u64 = 50;

#[embassy_executor::task]
pub async fn step_task() {
    let steppers = SharedSteppers;
    let mut ticker = Ticker::every(Duration::from_micros(STEP_POLL_US));
    let mut last = Instant::now();

    loop {
        ticker.next().await;

        let now = Instant::now();
        let elapsed_us = (now - last).as_micros() as u32;
        last = now;

        steppers.poll(elapsed_us);
    }
}
