//! Configuration types
//!
//! Board-agnostic stage configuration, its TOML reader, and the position
//! record stored in flash as postcard binary data.

pub mod position;
pub mod stage;
pub mod toml;

pub use position::*;
pub use stage::*;
pub use toml::{parse_stage_config, TomlError};
