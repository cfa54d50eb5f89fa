//! Configuration and stored position loading
//!
//! Both loaders degrade instead of failing boot: a bad stage config falls
//! back to the embedded one, a bad position record means homing first.

pub mod loader;
pub mod positions;

pub use loader::load_stage_config;
pub use positions::load_positions;
