//! Non-volatile record storage
//!
//! The stage keeps two records in flash: its last known actuator positions
//! and an optional TOML override of the stage configuration. Chip HALs
//! implement [`FlashStorage`] over whatever wear-leveled store they have.

use core::future::Future;

/// Record slots in the storage partition
///
/// Record-level integrity (magic, CRC) is the caller's concern; the store
/// only guarantees that a record is replaced whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Actuator step counts with validity marker (postcard)
    StagePositions = 0x01,
    /// Stage configuration override (UTF-8 TOML)
    StageConfigToml = 0x02,
}

impl From<StorageKey> for u8 {
    fn from(key: StorageKey) -> u8 {
        key as u8
    }
}

impl TryFrom<u8> for StorageKey {
    type Error = FlashError;

    fn try_from(tag: u8) -> Result<Self, FlashError> {
        match tag {
            0x01 => Ok(StorageKey::StagePositions),
            0x02 => Ok(StorageKey::StageConfigToml),
            _ => Err(FlashError::Corrupted),
        }
    }
}

/// Storage failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The flash peripheral reported an error
    Flash,
    /// The storage layer failed for another reason
    Storage,
    /// No record under this key
    NotFound,
    /// Record larger than the caller's buffer
    BufferTooSmall,
    /// Stored data could not be decoded
    Corrupted,
    /// No room left in the partition
    Full,
}

/// Wear-leveled key/record storage
///
/// A `write` replaces the whole record for its key or leaves the previous
/// one intact, so a power cut never leaves half a position record behind.
pub trait FlashStorage {
    /// Copy the record for `key` into `buffer`, returning its length
    fn read(
        &mut self,
        key: StorageKey,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize, FlashError>>;

    /// Store `data` as the record for `key`
    fn write(&mut self, key: StorageKey, data: &[u8]) -> impl Future<Output = Result<(), FlashError>>;

    /// Check whether a record exists for `key`
    fn exists(&mut self, key: StorageKey) -> impl Future<Output = bool>;

    /// Erase the whole partition, every record included
    fn erase_all(&mut self) -> impl Future<Output = Result<(), FlashError>>;
}

#[cfg(feature = "sequential-storage")]
mod map_key {
    use super::StorageKey;
    use sequential_storage::map::{Key, SerializationError};

    /// Keys are stored as their one-byte tag
    impl Key for StorageKey {
        fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
            let slot = buffer.first_mut().ok_or(SerializationError::BufferTooSmall)?;
            *slot = u8::from(*self);
            Ok(1)
        }

        fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError> {
            let tag = *buffer.first().ok_or(SerializationError::BufferTooSmall)?;
            let key = StorageKey::try_from(tag).map_err(|_| SerializationError::InvalidFormat)?;
            Ok((key, 1))
        }
    }
}
