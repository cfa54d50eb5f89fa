//! Stage configuration loading
//!
//! Reads the TOML copy stored in flash, falling back to the `stage.toml`
//! compiled into the firmware, then to built-in defaults.

use core::str;
use defmt::*;

use trifocus_core::config::{parse_stage_config, StageConfig, TomlError};
use trifocus_hal_rp2040::{FlashError, FlashStorageTrait, StorageKey};

/// Embedded default configuration (compiled into firmware)
/// Edit stage.toml and rebuild to customize
pub const EMBEDDED_CONFIG: &str = include_str!("../../stage.toml");

/// Maximum TOML config size
const MAX_TOML_SIZE: usize = 2048;

/// Configuration loading errors
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Flash operation failed
    Flash(FlashError),
    /// Invalid UTF-8 in TOML data
    InvalidUtf8,
    /// TOML parsing failed
    Toml(TomlError),
}

impl From<FlashError> for ConfigError {
    fn from(e: FlashError) -> Self {
        ConfigError::Flash(e)
    }
}

impl From<TomlError> for ConfigError {
    fn from(e: TomlError) -> Self {
        ConfigError::Toml(e)
    }
}

/// Load the stage configuration
pub async fn load_stage_config<F: FlashStorageTrait>(storage: &mut F) -> StageConfig {
    let config = if !storage.exists(StorageKey::StageConfigToml).await {
        debug!("No stage configuration in flash, using embedded");
        load_embedded()
    } else {
        match load_from_flash(storage).await {
            Ok(config) => {
                info!("Loaded stage configuration from flash");
                config
            }
            Err(e) => {
                warn!("Failed to load stage configuration: {:?}, using embedded", e);
                load_embedded()
            }
        }
    };

    log_config_summary(&config);
    config
}

async fn load_from_flash<F: FlashStorageTrait>(storage: &mut F) -> Result<StageConfig, ConfigError> {
    let mut buffer = [0u8; MAX_TOML_SIZE];
    let len = storage
        .read(StorageKey::StageConfigToml, &mut buffer)
        .await?;

    debug!("Read {} bytes of TOML from flash", len);

    let text = str::from_utf8(&buffer[..len]).map_err(|_| ConfigError::InvalidUtf8)?;
    Ok(parse(text)?)
}

/// Parse the embedded stage.toml
///
/// build.rs validates it, so failure here means the built-in defaults.
fn load_embedded() -> StageConfig {
    match parse(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to parse embedded config: {:?}", e);
            error!("Using built-in defaults");
            StageConfig::default()
        }
    }
}

fn parse(text: &str) -> Result<StageConfig, TomlError> {
    parse_stage_config(text, |key| warn!("Ignoring unknown config key '{}'", key))
}

fn log_config_summary(config: &StageConfig) {
    debug!(
        "  max speed {} steps/s, tick {} us",
        config.motion.max_speed_steps_per_sec, config.motion.tick_period_us
    );
    debug!(
        "  homing {:?}, timeout {} ms",
        config.homing.sequence, config.homing.timeout_ms
    );
    debug!(
        "  stroke {}..{} steps",
        config.geometry.stroke_min_steps, config.geometry.stroke_max_steps
    );
}
