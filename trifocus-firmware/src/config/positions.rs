//! Stored position loading

use defmt::*;

use trifocus_core::config::PersistenceConfig;
use trifocus_core::kinematics::StepCounts;
use trifocus_core::persistence::{PersistenceError, PositionStore};
use trifocus_hal_rp2040::{FlashError, FlashStorageTrait};

/// Load the last saved actuator positions
///
/// Returns `None` when the stage has to be homed before it may move.
pub async fn load_positions<F: FlashStorageTrait>(
    store: &mut PositionStore<F>,
    config: &PersistenceConfig,
) -> Option<StepCounts> {
    if config.reset_on_boot {
        warn!("reset_on_boot set, discarding stored position");
        if let Err(e) = store.reset().await {
            error!("Failed to invalidate stored position: {:?}", e);
        }
        return None;
    }

    match store.load_record().await {
        Ok(record) if record.valid => {
            let counts = record.counts();
            info!(
                "Restored position A={} B={} C={}",
                counts.a, counts.b, counts.c
            );
            Some(counts)
        }
        Ok(_) => {
            info!("Stored position marked invalid, homing required");
            None
        }
        Err(PersistenceError::Flash(FlashError::NotFound)) => {
            info!("No stored position, homing required");
            None
        }
        Err(e) => {
            warn!("Failed to load stored position: {:?}, homing required", e);
            None
        }
    }
}
