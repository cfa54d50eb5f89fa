//! Periodic status report over defmt

use defmt::*;
use embassy_time::{Duration, Ticker};

use trifocus_core::traits::StatusReport;

use crate::channels::PORT;

/// Report period
const STATUS_PERIOD_SECS: u64 = 5;

#[embassy_executor::task]
pub async fn status_task() {
    let mut ticker = Ticker::every(Duration::from_secs(STATUS_PERIOD_SECS));

    loop {
        ticker.next().await;

        debug!("[{}]", PORT.label());
        PORT.report(&mut |name, value| debug!("  {}: {:?}", name, value));
    }
}
