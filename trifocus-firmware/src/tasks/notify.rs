//! Notifier polling and foreground outputs
//!
//! Turns move and homing outcomes into reply lines, and follows the
//! command port's enable flag and fan speed on the output pins.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::pwm::PwmOutput;
use embassy_time::{Duration, Ticker};

use trifocus_core::command::Outcome;
use trifocus_drivers::{DriverEnable, Fan};
use trifocus_protocol::Reply;

use crate::channels::{PORT, REPLY_CHANNEL};

/// Notifier poll period
const NOTIFY_PERIOD_MS: u64 = 10;

#[embassy_executor::task]
pub async fn notify_task(
    mut enables: [DriverEnable<Output<'static>>; 3],
    mut fan: Option<Fan<PwmOutput<'static>>>,
) {
    info!("Notify task started");

    let mut ticker = Ticker::every(Duration::from_millis(NOTIFY_PERIOD_MS));

    loop {
        ticker.next().await;

        if let Some(outcome) = PORT.take_move_complete() {
            let reply = match outcome {
                Outcome::Completed => Reply::MoveComplete,
                Outcome::Faulted(fault) => Reply::MoveFault(fault.code()),
            };
            debug!("Move outcome: {:?}", outcome);
            REPLY_CHANNEL.send(reply).await;
        }

        if let Some(outcome) = PORT.take_homing_complete() {
            let reply = match outcome {
                Outcome::Completed => Reply::HomeComplete,
                Outcome::Faulted(fault) => Reply::HomeFault(fault.code()),
            };
            info!("Homing outcome: {:?}", outcome);
            REPLY_CHANNEL.send(reply).await;
        }

        let enabled = PORT.is_enabled();
        for enable in enables.iter_mut() {
            if enable.is_enabled() != enabled && enable.set_enabled(enabled).is_err() {
                warn!("Failed to drive stepper enable");
            }
        }

        if let Some(fan) = fan.as_mut() {
            let percent = PORT.fan_speed();
            if fan.percent() != percent {
                match fan.set_percent(percent) {
                    Ok(()) => debug!("Fan at {}%", percent),
                    Err(_) => warn!("Failed to set fan duty"),
                }
            }
        }
    }
}
