//! Host-side simulation for tests
//!
//! [`SimStage`] stands in for the step generator and the limit switches,
//! [`MemFlash`] for flash storage, and [`Rig`] wires both to a
//! [`StageController`] and a [`CommandPort`] the way the firmware does.

use heapless::Vec;
use trifocus_hal::{FlashError, FlashStorage, StorageKey};

use crate::command::CommandPort;
use crate::config::{HomingConfig, HomingOrder, StageConfig};
use crate::kinematics::{Actuator, AxisSpeeds, StepCounts};
use crate::motion::{on_limit_switch, StageController};
use crate::traits::StepGenerator;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimMotion {
    Idle,
    To { target: i32, speed: f32 },
    Velocity(f32),
}

/// Simulated three-actuator stage
///
/// Each actuator has a raw position (the generator's frame) and a physical
/// position that survives [`StepGenerator::set_current_position`]. A switch
/// reads asserted while the physical position is at or below its trip
/// point. Crossing a trip point records an edge and freezes that actuator
/// for the rest of the current [`advance`](Self::advance) call.
#[derive(Debug, Clone)]
pub struct SimStage {
    position: [i32; 3],
    offset: [i32; 3],
    switch_at: [i32; 3],
    motion: [SimMotion; 3],
    accum: [f64; 3],
    edges: [bool; 3],
    faulted: [bool; 3],
    last_speeds: Option<AxisSpeeds>,
}

impl SimStage {
    /// Stage at physical zero with switches at the given physical positions
    pub fn new(switch_at: [i32; 3]) -> Self {
        Self {
            position: [0; 3],
            offset: [0; 3],
            switch_at,
            motion: [SimMotion::Idle; 3],
            accum: [0.0; 3],
            edges: [false; 3],
            faulted: [false; 3],
            last_speeds: None,
        }
    }

    /// Physical position, independent of position redefinitions
    pub fn physical(&self, actuator: Actuator) -> i32 {
        let i = actuator.index();
        self.position[i] + self.offset[i]
    }

    /// Current switch levels
    pub fn switch_levels(&self) -> [bool; 3] {
        Actuator::ALL.map(|a| self.asserted(a))
    }

    /// Make the driver report a fault on one actuator
    pub fn set_faulted(&mut self, actuator: Actuator, faulted: bool) {
        self.faulted[actuator.index()] = faulted;
    }

    /// Speeds passed to the last `move_to`
    pub fn last_speeds(&self) -> Option<AxisSpeeds> {
        self.last_speeds
    }

    /// Take the asserting edges seen since the last call
    pub fn take_edges(&mut self) -> Vec<Actuator, 3> {
        let mut edges = Vec::new();
        for actuator in Actuator::ALL {
            if core::mem::take(&mut self.edges[actuator.index()]) {
                let _ = edges.push(actuator);
            }
        }
        edges
    }

    /// Let simulated time pass
    pub fn advance(&mut self, dt_ms: u32) {
        for actuator in Actuator::ALL {
            self.advance_one(actuator, dt_ms);
        }
    }

    fn advance_one(&mut self, actuator: Actuator, dt_ms: u32) {
        let i = actuator.index();
        let (direction, speed) = match self.motion[i] {
            SimMotion::Idle => return,
            SimMotion::To { target, speed } => ((target - self.position[i]).signum(), speed),
            SimMotion::Velocity(v) => (if v < 0.0 { -1 } else { 1 }, v.abs()),
        };

        self.accum[i] += speed as f64 * dt_ms as f64 / 1000.0;
        while self.accum[i] >= 1.0 {
            self.accum[i] -= 1.0;
            let was_asserted = self.asserted(actuator);
            self.position[i] += direction;

            if let SimMotion::To { target, .. } = self.motion[i] {
                if self.position[i] == target {
                    self.halt(i);
                }
            }
            if !was_asserted && self.asserted(actuator) {
                self.edges[i] = true;
                self.accum[i] = 0.0;
                return;
            }
            if self.motion[i] == SimMotion::Idle {
                return;
            }
        }
    }

    fn asserted(&self, actuator: Actuator) -> bool {
        self.physical(actuator) <= self.switch_at[actuator.index()]
    }

    fn halt(&mut self, i: usize) {
        self.motion[i] = SimMotion::Idle;
        self.accum[i] = 0.0;
    }
}

impl StepGenerator for SimStage {
    fn move_to(&mut self, targets: StepCounts, speeds: AxisSpeeds) {
        self.last_speeds = Some(speeds);
        for actuator in Actuator::ALL {
            let i = actuator.index();
            self.halt(i);
            if targets[actuator] != self.position[i] && speeds[actuator] > 0.0 {
                self.motion[i] = SimMotion::To {
                    target: targets[actuator],
                    speed: speeds[actuator],
                };
            }
        }
    }

    fn run_at_speed(&mut self, actuator: Actuator, steps_per_sec: f32) {
        let i = actuator.index();
        self.halt(i);
        if steps_per_sec != 0.0 {
            self.motion[i] = SimMotion::Velocity(steps_per_sec);
        }
    }

    fn is_moving(&self, actuator: Actuator) -> bool {
        self.motion[actuator.index()] != SimMotion::Idle
    }

    fn emergency_stop(&mut self, actuator: Actuator) {
        self.halt(actuator.index());
    }

    fn current_position(&self, actuator: Actuator) -> i32 {
        self.position[actuator.index()]
    }

    fn set_current_position(&mut self, actuator: Actuator, steps: i32) {
        let i = actuator.index();
        self.offset[i] += self.position[i] - steps;
        self.position[i] = steps;
    }

    fn is_faulted(&self, actuator: Actuator) -> bool {
        self.faulted[actuator.index()]
    }
}

/// Maximum record size held by [`MemFlash`]
const MEM_FLASH_RECORD: usize = 256;

/// In-memory flash storage
#[derive(Debug, Clone, Default)]
pub struct MemFlash {
    records: [Option<Vec<u8, MEM_FLASH_RECORD>>; 2],
}

fn slot(key: StorageKey) -> usize {
    match key {
        StorageKey::StagePositions => 0,
        StorageKey::StageConfigToml => 1,
    }
}

impl MemFlash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the lowest bit of one stored byte
    pub fn corrupt(&mut self, key: StorageKey, index: usize) {
        if let Some(byte) = self.records[slot(key)]
            .as_mut()
            .and_then(|record| record.get_mut(index))
        {
            *byte ^= 0x01;
        }
    }
}

impl FlashStorage for MemFlash {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let record = self.records[slot(key)]
            .as_ref()
            .ok_or(FlashError::NotFound)?;
        if buffer.len() < record.len() {
            return Err(FlashError::BufferTooSmall);
        }
        buffer[..record.len()].copy_from_slice(record);
        Ok(record.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        let record = Vec::from_slice(data).map_err(|_| FlashError::Full)?;
        self.records[slot(key)] = Some(record);
        Ok(())
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        self.records[slot(key)].is_some()
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.records = Default::default();
        Ok(())
    }
}

/// Switch trip points far below the working range
pub const FAR_SWITCHES: [i32; 3] = [-100_000; 3];

/// Configuration with short homing travel and pauses
pub fn quick_config() -> StageConfig {
    StageConfig {
        homing: HomingConfig {
            sequence: HomingOrder::Sequential,
            timeout_ms: 2_000,
            settle_ms: 20,
            resettle_ms: 10,
            backoff_steps: 40,
            slow_seek_ratio: 0.25,
            home_position_steps: 0,
            default_speed_steps_per_sec: 1000.0,
        },
        ..StageConfig::default()
    }
}

/// Controller, command port and simulated stage, ticked together
pub struct Rig {
    pub port: CommandPort,
    pub sim: SimStage,
    pub controller: StageController,
    pub now_ms: u32,
    tick_ms: u32,
}

impl Rig {
    /// Build an enabled rig
    pub fn new(config: StageConfig, restored: Option<StepCounts>, switch_at: [i32; 3]) -> Self {
        let port = CommandPort::new();
        port.enable_steppers(true);
        let mut sim = SimStage::new(switch_at);
        let tick_ms = (config.motion.tick_period_us / 1000).max(1);
        let controller = StageController::new(config, restored, &mut sim);
        Self {
            port,
            sim,
            controller,
            now_ms: 0,
            tick_ms,
        }
    }

    /// One control tick, then one tick period of simulated motion
    pub fn tick(&mut self) {
        let levels = self.sim.switch_levels();
        self.controller
            .tick(&self.port, &mut self.sim, &levels, self.now_ms);

        self.sim.advance(self.tick_ms);
        for actuator in self.sim.take_edges() {
            on_limit_switch(self.port.limits(), &mut self.sim, actuator);
        }
        self.now_ms = self.now_ms.wrapping_add(self.tick_ms);
    }

    /// Tick until `done` holds, giving up after `max_ticks`
    pub fn run_until(&mut self, max_ticks: u32, mut done: impl FnMut(&Rig) -> bool) -> bool {
        for _ in 0..max_ticks {
            self.tick();
            if done(self) {
                return true;
            }
        }
        false
    }

    /// Foreground stop, as the command handler issues it
    pub fn stop(&mut self) {
        self.port.stop_now(&mut self.sim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_move_reaches_target() {
        let mut sim = SimStage::new(FAR_SWITCHES);
        sim.move_to(StepCounts::new(10, -5, 0), AxisSpeeds::new(1000.0, 500.0, 0.0));

        sim.advance(5);
        assert_eq!(sim.positions(), StepCounts::new(5, -2, 0));
        sim.advance(10);
        assert_eq!(sim.positions(), StepCounts::new(10, -5, 0));
        assert!(!sim.any_moving());
    }

    #[test]
    fn test_sim_edge_freezes_actuator() {
        let mut sim = SimStage::new([-3, -100, -100]);
        sim.run_at_speed(Actuator::A, -1000.0);
        sim.advance(10);

        assert_eq!(sim.physical(Actuator::A), -3);
        assert_eq!(sim.take_edges().as_slice(), &[Actuator::A]);
        assert!(sim.take_edges().is_empty());
    }

    #[test]
    fn test_sim_position_redefinition_keeps_physical() {
        let mut sim = SimStage::new(FAR_SWITCHES);
        sim.move_to(StepCounts::splat(7), AxisSpeeds::new(1000.0, 1000.0, 1000.0));
        sim.advance(10);

        sim.set_current_position(Actuator::B, 100);
        assert_eq!(sim.current_position(Actuator::B), 100);
        assert_eq!(sim.physical(Actuator::B), 7);
    }
}
