//! Stage configuration types
//!
//! Everything the control tick needs to know about the physical stage.
//! Defaults describe the reference mirror cell; the firmware overrides them
//! from `stage.toml`.

use crate::kinematics::{MirrorGeometry, DEFAULT_COEFFICIENTS, STEPS_PER_MICRON};

/// Complete stage configuration
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StageConfig {
    pub geometry: GeometryConfig,
    pub motion: MotionConfig,
    pub homing: HomingConfig,
    pub persistence: PersistenceConfig,
}

/// Triangle geometry and safe travel limits
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GeometryConfig {
    /// Coefficients `[c0, c1, c2]` in microns per unit tangent
    pub coefficients: [f64; 3],
    /// Microsteps per micron of actuator travel
    pub steps_per_micron: f64,
    /// Largest absolute tip accepted in an absolute command (radians)
    pub max_tip_rad: f64,
    /// Largest absolute tilt accepted in an absolute command (radians)
    pub max_tilt_rad: f64,
    /// Lowest raw step position any actuator may be commanded to
    pub stroke_min_steps: i32,
    /// Highest raw step position any actuator may be commanded to
    pub stroke_max_steps: i32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            coefficients: DEFAULT_COEFFICIENTS,
            steps_per_micron: STEPS_PER_MICRON,
            max_tip_rad: 0.05,
            max_tilt_rad: 0.05,
            // ±10 mm of actuator travel
            stroke_min_steps: -53_333,
            stroke_max_steps: 53_333,
        }
    }
}

impl GeometryConfig {
    /// Kinematics for this geometry
    pub fn mirror(&self) -> MirrorGeometry {
        MirrorGeometry::new(self.coefficients, self.steps_per_micron)
    }

    /// Check if a raw step position lies inside the stroke
    pub fn in_stroke(&self, steps: i32) -> bool {
        (self.stroke_min_steps..=self.stroke_max_steps).contains(&steps)
    }
}

/// Move execution settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionConfig {
    /// Speed of the longest-travelling actuator in a move (steps/second)
    pub max_speed_steps_per_sec: f32,
    /// Control tick period in microseconds
    pub tick_period_us: u32,
    /// Only promote absolute commands once all three fields are staged
    pub require_complete_target: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_speed_steps_per_sec: 2000.0,
            tick_period_us: 1000,
            require_complete_target: false,
        }
    }
}

/// Order in which actuators seek their switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingOrder {
    /// All actuators seek together
    Simultaneous,
    /// One actuator at a time: A, then B, then C
    #[default]
    Sequential,
}

/// Homing sequence settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HomingConfig {
    /// Seek ordering across actuators
    pub sequence: HomingOrder,
    /// Abort a phase that completes no actuator for this long
    pub timeout_ms: u32,
    /// Pause on the switches after the fast seek
    pub settle_ms: u32,
    /// Pause after backing off, before the slow seek
    pub resettle_ms: u32,
    /// Minimum back-off travel before the switch may count as released
    pub backoff_steps: i32,
    /// Slow-seek speed as a fraction of the homing speed
    pub slow_seek_ratio: f32,
    /// Raw position assigned to each actuator at its zero reference
    pub home_position_steps: i32,
    /// Speed used when a homing request does not name one
    pub default_speed_steps_per_sec: f32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            sequence: HomingOrder::Sequential,
            timeout_ms: 60_000,
            settle_ms: 1000,
            resettle_ms: 300,
            // 1 mm of actuator travel
            backoff_steps: 5333,
            slow_seek_ratio: 0.1,
            home_position_steps: 0,
            default_speed_steps_per_sec: 1000.0,
        }
    }
}

/// Position persistence settings
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistenceConfig {
    /// Invalidate the stored position at boot, forcing a homing run
    pub reset_on_boot: bool,
}
