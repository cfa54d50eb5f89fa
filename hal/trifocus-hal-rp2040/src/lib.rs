//! RP2040-specific HAL for the mirror stage firmware
//!
//! Provides the RP2040 implementation of the shared `trifocus-hal`
//! flash storage trait. Pins, PWM and UART come straight from `embassy-rp`.

#![no_std]

pub mod flash;

pub use flash::Rp2040FlashStorage;
pub use trifocus_hal::{FlashError, FlashStorage as FlashStorageTrait, StorageKey};
