//! Position persistence task
//!
//! Owns the flash store after boot and writes the positions the control
//! tick queues. Back-to-back requests collapse to the latest one.

use defmt::*;

use trifocus_core::persistence::PositionStore;
use trifocus_hal_rp2040::Rp2040FlashStorage;

use crate::channels::SAVE_POSITIONS;

#[embassy_executor::task]
pub async fn persistence_task(mut store: PositionStore<Rp2040FlashStorage<'static>>) {
    info!("Persistence task started");

    loop {
        let counts = SAVE_POSITIONS.wait().await;

        match store.save(counts).await {
            Ok(()) => info!(
                "Saved position A={} B={} C={}",
                counts.a, counts.b, counts.c
            ),
            Err(e) => error!("Failed to save position: {:?}", e),
        }
    }
}
