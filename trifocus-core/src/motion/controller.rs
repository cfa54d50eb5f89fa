//! Stage controller
//!
//! Owns everything the control tick needs between cycles and runs one
//! cycle per [`StageController::tick`]. Within a cycle the order is fixed:
//!
//! 1. Apply a pending stop request
//! 2. Hold the stage if the drivers are disabled
//! 3. Accept a pending homing request
//! 4. Run the move state machine (promotion happens in IDLE and mid-move)
//! 5. Publish status to the command port
//!
//! Nothing here blocks or touches storage; persistence is requested via
//! [`StageController::take_pending_save`].

use crate::command::{AxisStatus, CommandBuffer, CommandPort, ControlMode, Outcome};
use crate::config::StageConfig;
use crate::kinematics::{synchronized_speeds, Actuator, MirrorGeometry, StepCounts};
use crate::motion::homing::{HomingProgress, HomingSequence};
use crate::state::{Event, Fault, HomingState, MoveState};
use crate::traits::{LimitInputs, StepGenerator};

/// Upper bound on state handlers run back to back in one tick
const MAX_CHAINED_STATES: usize = 6;

/// Tick-owned stage state
pub struct StageController {
    config: StageConfig,
    geometry: MirrorGeometry,
    buffer: CommandBuffer,
    state: MoveState,
    homing: HomingSequence,
    /// Last commanded raw step counts; relative moves add to this
    commanded: StepCounts,
    calibrated: bool,
    fault: Option<Fault>,
    zero_reference: Option<StepCounts>,
    pending_save: Option<StepCounts>,
    /// The command in NEW_MOVE_CMD replaced a move still in progress
    retargeting: bool,
}

impl StageController {
    /// Create a controller
    ///
    /// `restored` is the position loaded from storage. With `Some`, the
    /// generator is told it sits there and the stage counts as calibrated;
    /// with `None`, moves are refused until a homing run completes.
    pub fn new<G: StepGenerator>(
        config: StageConfig,
        restored: Option<StepCounts>,
        generator: &mut G,
    ) -> Self {
        let (commanded, calibrated, fault) = match restored {
            Some(counts) => {
                for actuator in Actuator::ALL {
                    generator.set_current_position(actuator, counts[actuator]);
                }
                (counts, true, None)
            }
            None => (generator.positions(), false, Some(Fault::NotCalibrated)),
        };

        Self {
            geometry: config.geometry.mirror(),
            buffer: CommandBuffer::new(config.motion.require_complete_target),
            config,
            state: MoveState::Idle,
            homing: HomingSequence::new(),
            commanded,
            calibrated,
            fault,
            zero_reference: None,
            pending_save: None,
            retargeting: false,
        }
    }

    /// Run one control cycle
    pub fn tick<G: StepGenerator, L: LimitInputs>(
        &mut self,
        port: &CommandPort,
        generator: &mut G,
        switches: &L,
        now_ms: u32,
    ) {
        if port.take_stop_request() {
            self.apply_stop(port, generator);
        }

        if port.is_enabled() {
            self.accept_home_request(port);
            for _ in 0..MAX_CHAINED_STATES {
                if !self.run_state(port, generator, switches, now_ms) {
                    break;
                }
            }
        } else {
            self.hold_disabled(port, generator);
        }

        self.publish(port, generator);
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    pub fn homing_state(&self) -> HomingState {
        self.homing.state()
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Last commanded raw step counts
    pub fn commanded(&self) -> StepCounts {
        self.commanded
    }

    /// Raw trip positions captured by the last completed homing run
    pub fn zero_reference(&self) -> Option<StepCounts> {
        self.zero_reference
    }

    /// Take the positions queued for persistence, if any
    pub fn take_pending_save(&mut self) -> Option<StepCounts> {
        self.pending_save.take()
    }

    fn apply(&mut self, event: Event) {
        if self.state == MoveState::HomingIsActive && event.ends_homing() {
            self.homing.reset();
        }
        self.state = self.state.transition(event);
    }

    fn apply_stop<G: StepGenerator>(&mut self, port: &CommandPort, generator: &mut G) {
        generator.stop_all();
        self.commanded = generator.positions();
        if self.calibrated && self.state != MoveState::HomingIsActive {
            self.pending_save = Some(self.commanded);
        }

        // The shadow side was already reset by `stop_now`
        port.limits().clear_all();

        self.fault = (!self.calibrated).then_some(Fault::NotCalibrated);
        self.retargeting = false;
        self.apply(Event::Stop);
    }

    fn hold_disabled<G: StepGenerator>(&mut self, port: &CommandPort, generator: &mut G) {
        if self.state.is_active() {
            generator.stop_all();
            self.commanded = generator.positions();
            if self.state == MoveState::HomingIsActive {
                port.notify_homing(Outcome::Faulted(Fault::Disabled));
            } else {
                port.notify_move(Outcome::Faulted(Fault::Disabled));
                if self.calibrated {
                    self.pending_save = Some(self.commanded);
                }
            }
            self.raise(Fault::Disabled);
            self.retargeting = false;
            self.apply(Event::Stop);
        }

        if port.take_home_request().is_some() {
            self.raise(Fault::Disabled);
            port.notify_homing(Outcome::Faulted(Fault::Disabled));
        }

        if self.buffer.check_for_new_command(port) {
            self.reject(port, Fault::Disabled);
        }
    }

    fn accept_home_request(&mut self, port: &CommandPort) {
        if !matches!(self.state, MoveState::Idle | MoveState::NewMoveCmd) {
            return;
        }
        if let Some(speed) = port.take_home_request() {
            self.homing.begin(speed);
            self.apply(Event::HomingRequested);
        }
    }

    /// Handle the current state; true if another handler should run now
    fn run_state<G: StepGenerator, L: LimitInputs>(
        &mut self,
        port: &CommandPort,
        generator: &mut G,
        switches: &L,
        now_ms: u32,
    ) -> bool {
        match self.state {
            MoveState::Idle => {
                if !self.buffer.check_for_new_command(port) {
                    return false;
                }
                if !self.calibrated {
                    self.reject(port, Fault::NotCalibrated);
                    return false;
                }
                if let Some(latched) = self.fault.filter(Fault::is_latching) {
                    self.reject(port, latched);
                    return false;
                }
                self.apply(Event::CommandPromoted);
                true
            }

            MoveState::NewMoveCmd => {
                let retargeting = core::mem::take(&mut self.retargeting);
                if self.buffer.mode() == ControlMode::Stop {
                    self.apply(Event::MoveCancelled);
                    return false;
                }
                match self.plan_move(generator, switches) {
                    Ok(target) => {
                        port.limits().clear_all();
                        let speeds = synchronized_speeds(
                            &generator.positions(),
                            &target,
                            self.config.motion.max_speed_steps_per_sec,
                        );
                        generator.move_to(target, speeds);
                        self.commanded = target;
                        self.fault = None;
                        self.apply(Event::MoveStarted);
                        true
                    }
                    Err(fault) => {
                        self.raise(fault);
                        port.notify_move(Outcome::Faulted(fault));
                        if retargeting {
                            // Keep supervising the previous target
                            self.apply(Event::RetargetRefused);
                            return true;
                        }
                        self.apply(Event::MoveCancelled);
                        false
                    }
                }
            }

            MoveState::MoveInProgress => {
                if port.limits().any() {
                    generator.stop_all();
                    self.apply(Event::LimitTripped);
                    return true;
                }
                if self.buffer.check_for_new_command(port) {
                    self.retargeting = true;
                    self.apply(Event::CommandPromoted);
                    return true;
                }
                if !generator.any_moving() {
                    self.apply(Event::MotionFinished);
                    return true;
                }
                false
            }

            MoveState::MoveComplete => {
                self.pending_save = Some(generator.positions());
                port.notify_move(Outcome::Completed);
                self.apply(Event::OutcomeReported);
                false
            }

            MoveState::LimitSwDetect => {
                generator.stop_all();
                let tripped = port.limits().first_set().unwrap_or(Actuator::A);
                let fault = Fault::LimitStrike(tripped);
                self.fault = Some(fault);
                self.commanded = generator.positions();
                port.notify_move(Outcome::Faulted(fault));
                port.limits().clear_all();
                self.apply(Event::OutcomeReported);
                false
            }

            MoveState::HomingIsActive => {
                let progress = self.homing.step(
                    now_ms,
                    generator,
                    switches,
                    port.limits(),
                    &self.config.homing,
                );
                match progress {
                    HomingProgress::Running => {}
                    HomingProgress::Complete(zero_reference) => {
                        self.zero_reference = Some(zero_reference);
                        self.calibrated = true;
                        self.fault = None;
                        self.commanded = StepCounts::splat(self.config.homing.home_position_steps);
                        self.pending_save = Some(generator.positions());
                        port.limits().clear_all();
                        port.notify_homing(Outcome::Completed);
                        self.apply(Event::HomingFinished);
                    }
                    HomingProgress::TimedOut(actuator) => {
                        let fault = Fault::HomingTimeout(actuator);
                        self.commanded = generator.positions();
                        self.raise(fault);
                        port.limits().clear_all();
                        port.notify_homing(Outcome::Faulted(fault));
                        self.apply(Event::HomingAborted);
                    }
                }
                false
            }
        }
    }

    /// Compute and validate step targets for the promoted command
    fn plan_move<G: StepGenerator, L: LimitInputs>(
        &self,
        generator: &G,
        switches: &L,
    ) -> Result<StepCounts, Fault> {
        let active = self.buffer.active();
        let geometry = &self.config.geometry;

        let target = match self.buffer.mode() {
            ControlMode::Absolute => {
                if !active.is_finite()
                    || active.tip.abs() > geometry.max_tip_rad
                    || active.tilt.abs() > geometry.max_tilt_rad
                {
                    return Err(Fault::OutOfRange);
                }
                self.geometry.steps_for(&active)
            }
            ControlMode::Relative => self
                .commanded
                .saturating_add(self.geometry.steps_for(&active)),
            ControlMode::Stop => self.commanded,
        };

        if !Actuator::ALL.iter().all(|&a| geometry.in_stroke(target[a])) {
            return Err(Fault::OutOfRange);
        }

        for actuator in Actuator::ALL {
            if switches.is_asserted(actuator) && target[actuator] < generator.current_position(actuator) {
                return Err(Fault::LimitStrike(actuator));
            }
        }

        Ok(target)
    }

    /// Refuse the command just promoted
    fn reject(&mut self, port: &CommandPort, fault: Fault) {
        self.raise(fault);
        port.notify_move(Outcome::Faulted(fault));
    }

    /// Record a fault without replacing a latched one
    fn raise(&mut self, fault: Fault) {
        if !self.fault.is_some_and(|f| f.is_latching()) {
            self.fault = Some(fault);
        }
    }

    fn publish<G: StepGenerator>(&self, port: &CommandPort, generator: &G) {
        for actuator in Actuator::ALL {
            let position = generator.current_position(actuator);
            let status = AxisStatus {
                faulted: generator.is_faulted(actuator)
                    || self.fault.is_some_and(|f| f.affects(actuator))
                    || !self.calibrated,
                home: self.calibrated && position == self.config.homing.home_position_steps,
                moving: generator.is_moving(actuator),
            };
            port.publish_axis(actuator, position, status);
        }
        port.publish_stage(self.state, self.homing.state(), self.fault, self.calibrated);
    }
}
