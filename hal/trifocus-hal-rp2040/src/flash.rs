//! Flash storage driver for RP2040
//!
//! Wear-leveled key-value records in the last 64 KiB of flash, through
//! sequential-storage. Implements the `FlashStorage` trait from
//! `trifocus-hal`; the stage position record is rewritten after every
//! move, so wear leveling matters here.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

pub use trifocus_hal::flash::{FlashError, StorageKey};

/// 2 MiB flash on the Pico and most RP2040 boards
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const STORAGE_PARTITION_SIZE: usize = 64 * 1024;
pub const STORAGE_PARTITION_START: usize = FLASH_SIZE - STORAGE_PARTITION_SIZE;

/// Flash range handed to sequential-storage
pub const STORAGE_RANGE: core::ops::Range<u32> =
    (STORAGE_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest record, the stage TOML included
pub const MAX_RECORD_SIZE: usize = 2048;

/// RP2040 flash storage
pub struct Rp2040FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
    scratch: [u8; MAX_RECORD_SIZE],
}

impl<'d> Rp2040FlashStorage<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
            scratch: [0; MAX_RECORD_SIZE],
        }
    }
}

fn map_error<E>(error: sequential_storage::Error<E>) -> FlashError {
    use sequential_storage::Error;
    match error {
        Error::FullStorage { .. } => FlashError::Full,
        Error::Corrupted { .. } => FlashError::Corrupted,
        Error::BufferTooSmall { .. } => FlashError::BufferTooSmall,
        Error::Storage { .. } => FlashError::Flash,
        _ => FlashError::Storage,
    }
}

impl<'d> trifocus_hal::FlashStorage for Rp2040FlashStorage<'d> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            STORAGE_RANGE,
            &mut NoCache::new(),
            &mut self.scratch,
            &key,
        )
        .await
        .map_err(map_error)?
        .ok_or(FlashError::NotFound)?;

        let len = data.len();
        if buffer.len() < len {
            return Err(FlashError::BufferTooSmall);
        }
        buffer[..len].copy_from_slice(data);
        Ok(len)
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        map::store_item(
            &mut self.flash,
            STORAGE_RANGE,
            &mut NoCache::new(),
            &mut self.scratch,
            &key,
            &data,
        )
        .await
        .map_err(map_error)
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        matches!(
            map::fetch_item::<StorageKey, &[u8], _>(
                &mut self.flash,
                STORAGE_RANGE,
                &mut NoCache::new(),
                &mut self.scratch,
                &key,
            )
            .await,
            Ok(Some(_))
        )
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.flash
            .erase(STORAGE_RANGE.start, STORAGE_RANGE.end)
            .await
            .map_err(|_| FlashError::Flash)
    }
}
