//! Homing sequence
//!
//! Establishes a repeatable zero reference for each actuator in five steps:
//!
//! 1. Fast seek toward the switches
//! 2. Settle on the switches
//! 3. Back off until each switch releases
//! 4. Settle again
//! 5. Slow seek; the trip point is the zero reference
//!
//! Seeks run either all actuators at once or one at a time, per
//! [`HomingOrder`]. Each seek or back-off step aborts if no actuator
//! completes within the configured timeout.

use crate::config::{HomingConfig, HomingOrder};
use crate::kinematics::{Actuator, StepCounts};
use crate::motion::limits::LimitFlags;
use crate::state::HomingState;
use crate::traits::{LimitInputs, StepGenerator};

/// Result of one homing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingProgress {
    /// Still working
    Running,
    /// All actuators homed; raw trip positions captured before the home
    /// position was assigned
    Complete(StepCounts),
    /// No progress within the timeout; everything has been stopped
    TimedOut(Actuator),
}

/// Homing sequence progress, owned by the control tick
#[derive(Debug, Clone)]
pub struct HomingSequence {
    state: HomingState,
    speed: f32,
    /// Actuator finished the current step
    done: [bool; 3],
    /// Actuator has been started in the current step
    running: [bool; 3],
    backoff_origin: StepCounts,
    zero_reference: StepCounts,
    phase_started_ms: u32,
    last_progress_ms: u32,
}

impl Default for HomingSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl HomingSequence {
    pub fn new() -> Self {
        Self {
            state: HomingState::Initialize,
            speed: 0.0,
            done: [false; 3],
            running: [false; 3],
            backoff_origin: StepCounts::ZERO,
            zero_reference: StepCounts::ZERO,
            phase_started_ms: 0,
            last_progress_ms: 0,
        }
    }

    /// Arm a new run at `speed` steps/second
    pub fn begin(&mut self, speed: f32) {
        self.reset();
        self.speed = speed;
    }

    /// Return to [`HomingState::Initialize`] without touching the actuators
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current step of the sequence
    pub fn state(&self) -> HomingState {
        self.state
    }

    /// Advance the sequence by one control tick
    pub fn step<G: StepGenerator, L: LimitInputs>(
        &mut self,
        now_ms: u32,
        generator: &mut G,
        switches: &L,
        limits: &LimitFlags,
        config: &HomingConfig,
    ) -> HomingProgress {
        match self.state {
            HomingState::Initialize => {
                limits.clear_all();
                self.start_phase(now_ms);
                for actuator in Actuator::ALL {
                    // Already sitting on its switch
                    self.done[actuator.index()] = switches.is_asserted(actuator);
                }
                self.state = HomingState::Step1;
                self.start_seeks(generator, -self.speed, config.sequence);
                self.finish_seek_phase(now_ms, generator, config)
            }

            HomingState::Step1 | HomingState::Step5 => {
                let capture = self.state == HomingState::Step5;
                let speed = self.seek_speed(config);

                for actuator in Actuator::ALL {
                    let i = actuator.index();
                    if !self.running[i] || self.done[i] {
                        continue;
                    }
                    if limits.is_set(actuator) || switches.is_asserted(actuator) {
                        generator.emergency_stop(actuator);
                        if capture {
                            self.zero_reference[actuator] = generator.current_position(actuator);
                        }
                        self.done[i] = true;
                        self.last_progress_ms = now_ms;
                    }
                }

                self.start_seeks(generator, -speed, config.sequence);
                self.finish_seek_phase(now_ms, generator, config)
            }

            HomingState::Step2 => {
                if elapsed(now_ms, self.phase_started_ms) >= config.settle_ms {
                    self.backoff_origin = generator.positions();
                    self.start_phase(now_ms);
                    for actuator in Actuator::ALL {
                        generator.run_at_speed(actuator, self.speed);
                        self.running[actuator.index()] = true;
                    }
                    self.state = HomingState::Step3;
                }
                HomingProgress::Running
            }

            HomingState::Step3 => {
                for actuator in Actuator::ALL {
                    let i = actuator.index();
                    if self.done[i] {
                        continue;
                    }
                    let travelled = generator
                        .current_position(actuator)
                        .saturating_sub(self.backoff_origin[actuator]);
                    if travelled >= config.backoff_steps && !switches.is_asserted(actuator) {
                        generator.emergency_stop(actuator);
                        self.done[i] = true;
                        self.last_progress_ms = now_ms;
                    }
                }

                if self.done.iter().all(|&d| d) {
                    limits.clear_all();
                    self.start_phase(now_ms);
                    self.state = HomingState::Step4;
                    return HomingProgress::Running;
                }
                self.check_timeout(now_ms, generator, config)
            }

            HomingState::Step4 => {
                if elapsed(now_ms, self.phase_started_ms) >= config.resettle_ms {
                    self.start_phase(now_ms);
                    self.state = HomingState::Step5;
                    let speed = self.seek_speed(config);
                    self.start_seeks(generator, -speed, config.sequence);
                }
                HomingProgress::Running
            }
        }
    }

    fn seek_speed(&self, config: &HomingConfig) -> f32 {
        if self.state == HomingState::Step5 {
            self.speed * config.slow_seek_ratio
        } else {
            self.speed
        }
    }

    fn start_phase(&mut self, now_ms: u32) {
        self.done = [false; 3];
        self.running = [false; 3];
        self.phase_started_ms = now_ms;
        self.last_progress_ms = now_ms;
    }

    /// Start the next pending seek(s) at a signed velocity
    fn start_seeks<G: StepGenerator>(&mut self, generator: &mut G, velocity: f32, order: HomingOrder) {
        let busy = |s: &Self, i: usize| s.running[i] && !s.done[i];

        for actuator in Actuator::ALL {
            let i = actuator.index();
            if self.done[i] || self.running[i] {
                continue;
            }
            if order == HomingOrder::Sequential && (0..3).any(|j| busy(self, j)) {
                break;
            }
            generator.run_at_speed(actuator, velocity);
            self.running[i] = true;
        }
    }

    fn finish_seek_phase<G: StepGenerator>(
        &mut self,
        now_ms: u32,
        generator: &mut G,
        config: &HomingConfig,
    ) -> HomingProgress {
        if !self.done.iter().all(|&d| d) {
            return self.check_timeout(now_ms, generator, config);
        }

        match self.state {
            HomingState::Step5 => {
                for actuator in Actuator::ALL {
                    generator.set_current_position(actuator, config.home_position_steps);
                }
                let zero_reference = self.zero_reference;
                self.reset();
                HomingProgress::Complete(zero_reference)
            }
            _ => {
                self.start_phase(now_ms);
                self.state = HomingState::Step2;
                HomingProgress::Running
            }
        }
    }

    fn check_timeout<G: StepGenerator>(
        &mut self,
        now_ms: u32,
        generator: &mut G,
        config: &HomingConfig,
    ) -> HomingProgress {
        if elapsed(now_ms, self.last_progress_ms) < config.timeout_ms {
            return HomingProgress::Running;
        }

        let stalled = Actuator::ALL
            .into_iter()
            .find(|a| !self.done[a.index()])
            .unwrap_or(Actuator::A);
        generator.stop_all();
        self.reset();
        HomingProgress::TimedOut(stalled)
    }
}

fn elapsed(now_ms: u32, since_ms: u32) -> u32 {
    now_ms.wrapping_sub(since_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::limits::on_limit_switch;
    use crate::testing::SimStage;

    fn quick_config(sequence: HomingOrder) -> HomingConfig {
        HomingConfig {
            sequence,
            timeout_ms: 5_000,
            settle_ms: 20,
            resettle_ms: 10,
            backoff_steps: 50,
            slow_seek_ratio: 0.25,
            home_position_steps: 0,
            default_speed_steps_per_sec: 1000.0,
        }
    }

    /// Drive a homing run against the simulator, one millisecond per step
    fn run_homing(
        sim: &mut SimStage,
        config: &HomingConfig,
        speed: f32,
        max_ms: u32,
    ) -> (HomingProgress, u32) {
        let limits = LimitFlags::new();
        let mut homing = HomingSequence::new();
        homing.begin(speed);

        for now in 0..max_ms {
            let levels = sim.switch_levels();
            let progress = homing.step(now, sim, &levels, &limits, config);
            if progress != HomingProgress::Running {
                return (progress, now);
            }
            sim.advance(1);
            for actuator in sim.take_edges() {
                on_limit_switch(&limits, sim, actuator);
            }
        }
        (HomingProgress::Running, max_ms)
    }

    #[test]
    fn test_sequential_homing_completes() {
        let mut sim = SimStage::new([-200, -150, -250]);
        let config = quick_config(HomingOrder::Sequential);

        let (progress, _) = run_homing(&mut sim, &config, 1000.0, 20_000);

        match progress {
            HomingProgress::Complete(refs) => {
                assert_eq!(refs, StepCounts::new(-200, -150, -250));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sim.positions(), StepCounts::ZERO);
        assert!(!sim.any_moving());
    }

    #[test]
    fn test_simultaneous_homing_is_faster() {
        let config_seq = quick_config(HomingOrder::Sequential);
        let config_sim = quick_config(HomingOrder::Simultaneous);

        let mut sim = SimStage::new([-200; 3]);
        let (_, sequential_ms) = run_homing(&mut sim, &config_seq, 1000.0, 20_000);

        let mut sim = SimStage::new([-200; 3]);
        let (progress, simultaneous_ms) = run_homing(&mut sim, &config_sim, 1000.0, 20_000);

        assert!(matches!(progress, HomingProgress::Complete(_)));
        assert!(simultaneous_ms < sequential_ms);
    }

    #[test]
    fn test_homing_twice_captures_same_reference() {
        let config = quick_config(HomingOrder::Sequential);
        let mut sim = SimStage::new([-180, -220, -300]);

        let (first, _) = run_homing(&mut sim, &config, 1000.0, 20_000);
        let physical: [i32; 3] = Actuator::ALL.map(|a| sim.physical(a));

        let (second, _) = run_homing(&mut sim, &config, 1000.0, 20_000);
        let (third, _) = run_homing(&mut sim, &config, 1000.0, 20_000);

        assert!(matches!(first, HomingProgress::Complete(_)));
        assert_eq!(second, HomingProgress::Complete(StepCounts::ZERO));
        assert_eq!(second, third);
        assert_eq!(Actuator::ALL.map(|a| sim.physical(a)), physical);
    }

    #[test]
    fn test_start_on_switch_counts_as_found() {
        let config = quick_config(HomingOrder::Sequential);
        let mut sim = SimStage::new([0, -100, -100]);
        assert!(sim.switch_levels()[0]);

        let (progress, _) = run_homing(&mut sim, &config, 1000.0, 20_000);
        assert!(matches!(progress, HomingProgress::Complete(_)));
    }

    #[test]
    fn test_missing_switch_times_out() {
        let mut config = quick_config(HomingOrder::Sequential);
        config.timeout_ms = 500;
        // B's switch is out of reach
        let mut sim = SimStage::new([-100, -1_000_000, -100]);

        let (progress, elapsed_ms) = run_homing(&mut sim, &config, 1000.0, 20_000);

        assert_eq!(progress, HomingProgress::TimedOut(Actuator::B));
        assert!(elapsed_ms < 1_000);
        assert!(!sim.any_moving());
    }

    #[test]
    fn test_timeout_restarts_on_progress() {
        let mut config = quick_config(HomingOrder::Sequential);
        config.timeout_ms = 150;
        config.slow_seek_ratio = 0.5;
        // Each seek alone takes about 100 ms, three in a row take 300 ms
        let mut sim = SimStage::new([-100, -100, -100]);

        let (progress, _) = run_homing(&mut sim, &config, 1000.0, 20_000);
        assert!(matches!(progress, HomingProgress::Complete(_)));
    }
}
