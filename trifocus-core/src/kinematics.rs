//! Stage kinematics
//!
//! Maps an engineering-unit target (tip and tilt in radians, focus in
//! microns) onto the three actuators sitting in a triangle under the
//! mirror, and back again.
//!
//! ```text
//! distA = focus + c0*tan(tip)
//! distB = focus + c1*tan(tip) + c2*tan(tilt)/cos(tip)
//! distC = focus + c1*tan(tip) - c2*tan(tilt)/cos(tip)
//! steps = round(dist * steps_per_micron)
//! ```
//!
//! Everything here is a pure function of its inputs and is safe to call
//! from the control tick or the foreground without synchronization.
//!
//! # Precondition
//!
//! `tan(tilt)/cos(tip)` diverges as tip approaches ±90°. Nothing here
//! clamps; callers keep tip inside the stage's configured range (far from
//! the singularity) before converting.

use core::ops::{Index, IndexMut};

use num_traits::float::Float;

/// Microstepping divisor of the actuator drivers
pub const MICROSTEP_DIVIDER: f64 = 16.0;

/// Vertical travel of one full motor step in microns
pub const MICRONS_PER_FULL_STEP: f64 = 3.0;

/// Microsteps per micron of actuator travel (16 / 3)
pub const STEPS_PER_MICRON: f64 = MICROSTEP_DIVIDER / MICRONS_PER_FULL_STEP;

/// Geometry coefficients for the actuator triangle
///
/// `c0` scales tip onto actuator A, `c1` scales tip onto B and C, and `c2`
/// scales tilt onto B and C with opposite sign.
pub const DEFAULT_COEFFICIENTS: [f64; 3] = [281.3, -140.6, 243.6];

/// One of the three linear actuators under the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Actuator {
    A,
    B,
    C,
}

impl Actuator {
    /// All actuators in sequencing order
    pub const ALL: [Actuator; 3] = [Actuator::A, Actuator::B, Actuator::C];

    /// Array index of this actuator
    pub const fn index(self) -> usize {
        match self {
            Actuator::A => 0,
            Actuator::B => 1,
            Actuator::C => 2,
        }
    }

    /// Actuator for an array index
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Actuator::A),
            1 => Some(Actuator::B),
            2 => Some(Actuator::C),
            _ => None,
        }
    }

    /// Single-letter name used in replies and logs
    pub const fn name(self) -> &'static str {
        match self {
            Actuator::A => "A",
            Actuator::B => "B",
            Actuator::C => "C",
        }
    }
}

/// Engineering-unit stage target
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisTarget {
    /// Tip angle in radians
    pub tip: f64,
    /// Tilt angle in radians
    pub tilt: f64,
    /// Focus offset in microns
    pub focus: f64,
}

impl AxisTarget {
    /// The flat, unfocused target
    pub const ZERO: AxisTarget = AxisTarget::new(0.0, 0.0, 0.0);

    pub const fn new(tip: f64, tilt: f64, focus: f64) -> Self {
        Self { tip, tilt, focus }
    }

    /// True if no field is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.tip.is_finite() && self.tilt.is_finite() && self.focus.is_finite()
    }
}

/// Step counts for the three actuators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepCounts {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl StepCounts {
    pub const ZERO: StepCounts = StepCounts::new(0, 0, 0);

    pub const fn new(a: i32, b: i32, c: i32) -> Self {
        Self { a, b, c }
    }

    /// The same count on every actuator
    pub const fn splat(steps: i32) -> Self {
        Self::new(steps, steps, steps)
    }

    /// Build from a per-actuator function
    pub fn from_fn(mut f: impl FnMut(Actuator) -> i32) -> Self {
        Self::new(f(Actuator::A), f(Actuator::B), f(Actuator::C))
    }

    /// Element-wise saturating sum
    pub fn saturating_add(self, other: StepCounts) -> StepCounts {
        StepCounts::new(
            self.a.saturating_add(other.a),
            self.b.saturating_add(other.b),
            self.c.saturating_add(other.c),
        )
    }
}

impl Index<Actuator> for StepCounts {
    type Output = i32;

    fn index(&self, actuator: Actuator) -> &i32 {
        match actuator {
            Actuator::A => &self.a,
            Actuator::B => &self.b,
            Actuator::C => &self.c,
        }
    }
}

impl IndexMut<Actuator> for StepCounts {
    fn index_mut(&mut self, actuator: Actuator) -> &mut i32 {
        match actuator {
            Actuator::A => &mut self.a,
            Actuator::B => &mut self.b,
            Actuator::C => &mut self.c,
        }
    }
}

/// Per-actuator step rates in steps/second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSpeeds {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl AxisSpeeds {
    pub const fn new(a: f32, b: f32, c: f32) -> Self {
        Self { a, b, c }
    }
}

impl Index<Actuator> for AxisSpeeds {
    type Output = f32;

    fn index(&self, actuator: Actuator) -> &f32 {
        match actuator {
            Actuator::A => &self.a,
            Actuator::B => &self.b,
            Actuator::C => &self.c,
        }
    }
}

/// Triangle geometry and step scaling
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MirrorGeometry {
    /// Coefficients `[c0, c1, c2]` in microns per unit tangent
    pub coefficients: [f64; 3],
    /// Microsteps per micron of actuator travel
    pub steps_per_micron: f64,
}

impl Default for MirrorGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_COEFFICIENTS, STEPS_PER_MICRON)
    }
}

impl MirrorGeometry {
    pub const fn new(coefficients: [f64; 3], steps_per_micron: f64) -> Self {
        Self {
            coefficients,
            steps_per_micron,
        }
    }

    /// Actuator travel in microns for a target
    pub fn distances(&self, target: &AxisTarget) -> [f64; 3] {
        let [c0, c1, c2] = self.coefficients;
        let tan_tip = Float::tan(target.tip);
        let cos_tip = Float::cos(target.tip);
        let tilt_term = c2 * Float::tan(target.tilt) / cos_tip;

        [
            target.focus + c0 * tan_tip,
            target.focus + c1 * tan_tip + tilt_term,
            target.focus + c1 * tan_tip - tilt_term,
        ]
    }

    /// Convert an engineering-unit target into actuator step counts
    ///
    /// Rounds to the nearest step (half away from zero).
    pub fn steps_for(&self, target: &AxisTarget) -> StepCounts {
        let [a, b, c] = self.distances(target);
        StepCounts::new(self.to_steps(a), self.to_steps(b), self.to_steps(c))
    }

    /// Recover the engineering-unit target that a set of step counts
    /// represents
    ///
    /// Exact inverse of [`distances`](Self::distances); applied to rounded
    /// counts it is off by at most the quantization of one step.
    pub fn target_for(&self, counts: &StepCounts) -> AxisTarget {
        let [c0, c1, c2] = self.coefficients;
        let a = counts.a as f64 / self.steps_per_micron;
        let b = counts.b as f64 / self.steps_per_micron;
        let c = counts.c as f64 / self.steps_per_micron;

        let tan_tip = (a - (b + c) / 2.0) / (c0 - c1);
        let tip = Float::atan(tan_tip);
        let focus = a - c0 * tan_tip;
        let tilt = Float::atan((b - c) * Float::cos(tip) / (2.0 * c2));

        AxisTarget::new(tip, tilt, focus)
    }

    fn to_steps(&self, microns: f64) -> i32 {
        Float::round(microns * self.steps_per_micron) as i32
    }
}

/// Per-actuator speeds that make a multi-axis move finish together
///
/// The actuator with the longest travel runs at `max_speed`; the others
/// are scaled by their share of that travel. Actuators that do not move get
/// zero.
pub fn synchronized_speeds(from: &StepCounts, to: &StepCounts, max_speed: f32) -> AxisSpeeds {
    let delta = |a: Actuator| (to[a] as i64 - from[a] as i64).unsigned_abs();
    let longest = Actuator::ALL.iter().map(|&a| delta(a)).max().unwrap_or(0);

    if longest == 0 {
        return AxisSpeeds::default();
    }

    let scale = |a: Actuator| max_speed * (delta(a) as f32 / longest as f32);
    AxisSpeeds::new(
        scale(Actuator::A),
        scale(Actuator::B),
        scale(Actuator::C),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_target_step_counts() {
        let geometry = MirrorGeometry::default();
        let steps = geometry.steps_for(&AxisTarget::new(0.01, 0.0, 50.0));

        // distA ≈ 52.813 µm, distB = distC ≈ 48.594 µm
        assert_eq!(steps, StepCounts::new(282, 259, 259));
    }

    #[test]
    fn test_zero_target_is_zero_steps() {
        let geometry = MirrorGeometry::default();
        assert_eq!(geometry.steps_for(&AxisTarget::ZERO), StepCounts::ZERO);
    }

    #[test]
    fn test_pure_focus_moves_all_actuators_equally() {
        let geometry = MirrorGeometry::default();
        let steps = geometry.steps_for(&AxisTarget::new(0.0, 0.0, 300.0));
        assert_eq!(steps, StepCounts::splat(1600));
    }

    #[test]
    fn test_tilt_is_antisymmetric_on_b_and_c() {
        let geometry = MirrorGeometry::default();
        let steps = geometry.steps_for(&AxisTarget::new(0.0, 0.004, 0.0));
        assert_eq!(steps.a, 0);
        assert_eq!(steps.b, -steps.c);
        assert!(steps.b > 0);
    }

    #[test]
    fn test_rounding_is_to_nearest() {
        let geometry = MirrorGeometry::new([0.0, 0.0, 0.0], 1.0);
        assert_eq!(geometry.steps_for(&AxisTarget::new(0.0, 0.0, 2.5)).a, 3);
        assert_eq!(geometry.steps_for(&AxisTarget::new(0.0, 0.0, 2.49)).a, 2);
        assert_eq!(geometry.steps_for(&AxisTarget::new(0.0, 0.0, -2.5)).a, -3);
    }

    #[test]
    fn test_synchronized_speeds_scale_by_travel() {
        let from = StepCounts::new(0, 100, 0);
        let to = StepCounts::new(1000, 600, 0);
        let speeds = synchronized_speeds(&from, &to, 2000.0);

        assert_eq!(speeds.a, 2000.0);
        assert_eq!(speeds.b, 1000.0);
        assert_eq!(speeds.c, 0.0);
    }

    #[test]
    fn test_synchronized_speeds_no_travel() {
        let counts = StepCounts::new(5, 6, 7);
        assert_eq!(
            synchronized_speeds(&counts, &counts, 1000.0),
            AxisSpeeds::default()
        );
    }

    #[test]
    fn test_actuator_index_mapping() {
        for (i, actuator) in Actuator::ALL.iter().enumerate() {
            assert_eq!(actuator.index(), i);
            assert_eq!(Actuator::from_index(i), Some(*actuator));
        }
        assert_eq!(Actuator::from_index(3), None);
    }

    proptest! {
        #[test]
        fn test_inverse_recovers_target_within_one_step(
            tip in -0.02f64..0.02,
            tilt in -0.02f64..0.02,
            focus in -5000.0f64..5000.0,
        ) {
            let geometry = MirrorGeometry::default();
            let [c0, c1, c2] = geometry.coefficients;
            let step = 1.0 / geometry.steps_per_micron;

            let target = AxisTarget::new(tip, tilt, focus);
            let steps = geometry.steps_for(&target);
            let recovered = geometry.target_for(&steps);

            // Each count is off by at most half a step; propagate that
            // through the inverse relation.
            // tilt also picks up the tip error through cos(tip)
            let tip_bound = step / (c0 - c1) + 1e-12;
            let tilt_bound = step / (2.0 * c2.abs()) + 1e-6;
            let focus_bound = step / 2.0 + c0.abs() * tip_bound;

            prop_assert!((recovered.tip - tip).abs() <= tip_bound);
            prop_assert!((recovered.tilt - tilt).abs() <= tilt_bound);
            prop_assert!((recovered.focus - focus).abs() <= focus_bound);

            // Quantized counts map back onto themselves exactly
            prop_assert_eq!(geometry.steps_for(&recovered), steps);
        }
    }
}
