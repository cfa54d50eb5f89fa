//! Position persistence
//!
//! Loads and saves the last known actuator step counts over any
//! [`FlashStorage`]. Only the persistence task and startup call into this;
//! the control tick only queues save requests.

use trifocus_hal::{FlashError, FlashStorage, StorageKey};

use crate::config::PositionRecord;
use crate::kinematics::StepCounts;

/// Maximum serialized record size
const MAX_RECORD_SIZE: usize = 64;

/// Position persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistenceError {
    /// Flash operation failed
    Flash(FlashError),
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// Invalid magic or version
    InvalidFormat,
    /// CRC check failed
    CrcMismatch,
}

impl From<FlashError> for PersistenceError {
    fn from(e: FlashError) -> Self {
        PersistenceError::Flash(e)
    }
}

/// Stage position store over a flash backend
pub struct PositionStore<F> {
    storage: F,
}

impl<F: FlashStorage> PositionStore<F> {
    pub fn new(storage: F) -> Self {
        Self { storage }
    }

    /// Underlying storage, for other records sharing the partition
    pub fn storage_mut(&mut self) -> &mut F {
        &mut self.storage
    }

    /// Load the stored positions
    ///
    /// `None` means the stage must be homed before it can move: nothing
    /// stored, an unreadable or foreign record, a CRC mismatch, or a record
    /// explicitly marked invalid.
    pub async fn load(&mut self) -> Option<StepCounts> {
        match self.load_record().await {
            Ok(record) if record.valid => Some(record.counts()),
            _ => None,
        }
    }

    /// Load and validate the raw record
    pub async fn load_record(&mut self) -> Result<PositionRecord, PersistenceError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let len = self
            .storage
            .read(StorageKey::StagePositions, &mut buffer)
            .await?;

        let record: PositionRecord =
            postcard::from_bytes(&buffer[..len]).map_err(|_| PersistenceError::Deserialize)?;

        if !record.is_valid() {
            return Err(PersistenceError::InvalidFormat);
        }

        if !record.verify_crc() {
            return Err(PersistenceError::CrcMismatch);
        }

        Ok(record)
    }

    /// Store trusted positions
    pub async fn save(&mut self, counts: StepCounts) -> Result<(), PersistenceError> {
        self.write_record(&PositionRecord::new(counts)).await
    }

    /// Mark the stored positions untrusted
    pub async fn reset(&mut self) -> Result<(), PersistenceError> {
        self.write_record(&PositionRecord::invalid()).await
    }

    async fn write_record(&mut self, record: &PositionRecord) -> Result<(), PersistenceError> {
        let mut buffer = [0u8; MAX_RECORD_SIZE];
        let bytes =
            postcard::to_slice(record, &mut buffer).map_err(|_| PersistenceError::Serialize)?;

        self.storage
            .write(StorageKey::StagePositions, bytes)
            .await?;

        Ok(())
    }
}
