//! Stored stage position record
//!
//! The last known actuator step counts, persisted to flash after every
//! completed move and homing run so the stage does not need to re-home on
//! every power cycle.

use serde::{Deserialize, Serialize};

use crate::kinematics::StepCounts;

/// Magic number to identify a position record
pub const POSITION_MAGIC: u32 = 0x5452_4650; // "TRFP"

/// Current position record version
pub const POSITION_VERSION: u8 = 1;

/// Position record stored in flash
///
/// This struct is serialized to flash using postcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionRecord {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    /// Actuator A raw position in steps
    pub a: i32,
    /// Actuator B raw position in steps
    pub b: i32,
    /// Actuator C raw position in steps
    pub c: i32,
    /// Whether the positions can be trusted
    pub valid: bool,
    /// CRC32 checksum (calculated over magic..valid)
    pub crc: u32,
}

impl Default for PositionRecord {
    fn default() -> Self {
        Self::invalid()
    }
}

impl PositionRecord {
    /// Record holding trusted positions, CRC filled in
    pub fn new(counts: StepCounts) -> Self {
        let mut record = Self {
            magic: POSITION_MAGIC,
            version: POSITION_VERSION,
            a: counts.a,
            b: counts.b,
            c: counts.c,
            valid: true,
            crc: 0,
        };
        record.update_crc();
        record
    }

    /// Record that marks the stored position as untrusted
    pub fn invalid() -> Self {
        let mut record = Self::new(StepCounts::ZERO);
        record.valid = false;
        record.update_crc();
        record
    }

    /// Check if the header matches this firmware's format
    pub fn is_valid(&self) -> bool {
        self.magic == POSITION_MAGIC && self.version == POSITION_VERSION
    }

    /// Stored step counts
    pub fn counts(&self) -> StepCounts {
        StepCounts::new(self.a, self.b, self.c)
    }

    /// Calculate CRC32 for the record (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);
        crc = crc32_update(crc, &self.a.to_le_bytes());
        crc = crc32_update(crc, &self.b.to_le_bytes());
        crc = crc32_update(crc, &self.c.to_le_bytes());
        crc = crc32_update(crc, &[self.valid as u8]);

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        // Standard CRC-32 check input
        assert_eq!(!crc32_update(0xFFFFFFFF, b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_new_record_is_valid() {
        let record = PositionRecord::new(StepCounts::new(282, 259, -7));
        assert!(record.is_valid());
        assert!(record.valid);
        assert!(record.verify_crc());
        assert_eq!(record.counts(), StepCounts::new(282, 259, -7));
    }

    #[test]
    fn test_invalid_record() {
        let record = PositionRecord::invalid();
        assert!(record.is_valid());
        assert!(!record.valid);
        assert!(record.verify_crc());
    }

    #[test]
    fn test_crc_detects_modification() {
        let mut record = PositionRecord::new(StepCounts::splat(100));
        record.b = 101;
        assert!(!record.verify_crc());
    }
}
