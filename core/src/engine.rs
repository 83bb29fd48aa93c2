//! The event-driven simulation engine.
//!
//! PER-STEP ORDER (fixed, documented, never reordered):
//!   1. Cancellation check
//!   2. Event queue drain — each due event dispatched through
//!      `handle_flight_event`, then default-handled; events raised while
//!      handling join the same queue (the event cascade) and are
//!      processed before physics advances
//!   3. `pre_step` (vetoable)
//!   4. Stepper integration, with the flight-conditions hooks fired
//!      inside the stepper
//!   5. `post_step` (every listener, always)
//!   6. Threshold-crossing detection queueing new events
//!
//! `end_simulation` fires on every exit path, carrying the causing error
//! if any. An aborted run returns partial flight data marked `Aborted`,
//! not an `Err` — only misconfigurations that prevent stepping entirely
//! are surfaced as errors.

use crate::conditions::SimulationConditions;
use crate::configuration::{DeploymentConfig, FlightConfiguration};
use crate::error::{AbortCause, SimResult, SimulationError};
use crate::flight_data::{FlightData, FlightDataBranch, FlightDataStatus, FlightDataType};
use crate::flight_event::{EventPayload, FlightEvent, FlightEventKind};
use crate::pipeline::ListenerPipeline;
use crate::status::{MotorState, SimulationStatus};
use crate::stepper::{BasicStepper, FlightStepper};
use crate::types::SimTime;
use crate::warning::Warning;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Events and times closer than this are simultaneous.
const TIME_EPSILON: SimTime = 1e-9;

/// Descent speed above which a deploying recovery device draws a warning.
const DEPLOYMENT_SPEED_WARNING: f64 = 20.0;

/// Cooperative cancellation flag, checked before every step.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct SimulationEngine {
    /// `None` until `simulate` builds the default stepper from the run's
    /// wind settings and seed. A caller-supplied stepper is kept across
    /// runs.
    stepper: Option<Box<dyn FlightStepper>>,
    use_default_stepper: bool,
    cancel: CancellationToken,
}

impl SimulationEngine {
    /// Engine with the built-in point-mass stepper, seeded from the
    /// conditions' master seed at `simulate` time.
    pub fn new() -> Self {
        Self {
            stepper: None,
            use_default_stepper: true,
            cancel: CancellationToken::new(),
        }
    }

    /// Engine driving a caller-supplied stepper.
    pub fn with_stepper(stepper: Box<dyn FlightStepper>) -> Self {
        Self {
            stepper: Some(stepper),
            use_default_stepper: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one simulation to completion.
    ///
    /// Returns `Err` only for configurations that cannot step at all.
    /// Aborts and cancellations mid-run return `Ok` with partial data
    /// marked [`FlightDataStatus::Aborted`].
    pub fn simulate(&mut self, mut conditions: SimulationConditions) -> SimResult<FlightData> {
        let mut flight_data = FlightData::new();
        log::info!(
            "starting run {} of configuration '{}'",
            flight_data.run_id(),
            conditions.configuration.name
        );

        // A fresh default stepper per run keeps wind state from leaking
        // across runs.
        if self.use_default_stepper {
            self.stepper = Some(Box::new(BasicStepper::new(conditions.wind, conditions.seed)));
        }

        // Extensions install fresh listeners, once, before anything else.
        for extension in conditions.take_extensions() {
            log::debug!("initializing extension '{}'", extension.name());
            extension.initialize(&mut conditions)?;
        }
        let mut pipeline = conditions.take_listeners();

        // Sanity checks that keep us from simulating at all.
        if conditions.configuration.stages.is_empty() {
            return Err(SimulationError::Abort { cause: AbortCause::NoActiveStages });
        }
        if !conditions.configuration.has_motors() {
            return Err(SimulationError::Abort { cause: AbortCause::NoMotorsDefined });
        }

        let branch_name = conditions
            .configuration
            .top_stage()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "main".to_string());
        let mut initial_branch = FlightDataBranch::new(branch_name, FlightDataType::time());
        // Put a point on it so an early abort still has plottable data.
        initial_branch.add_point();
        initial_branch.set_value(&FlightDataType::time(), 0.0);
        initial_branch.set_value(&FlightDataType::altitude(), 0.0);

        let mut status = SimulationStatus::new(conditions.configuration.clone(), initial_branch);
        if !status.configuration().has_recovery_device() {
            status.add_warning(Warning::NoRecoveryDevice);
        }
        status.add_event(FlightEvent::new(FlightEventKind::Launch, 0.0));

        // startSimulation fires once per run, before the first step.
        if let Err(e) = pipeline.fire_start_simulation(&mut status) {
            return Ok(self.finish_aborted(&mut pipeline, status, flight_data, e));
        }

        let mut to_simulate: VecDeque<SimulationStatus> = VecDeque::new();
        to_simulate.push_back(status);

        while let Some(mut status) = to_simulate.pop_front() {
            log::info!(">> simulating branch '{}'", status.flight_data().name());
            let result =
                self.simulate_branch(&mut status, &mut pipeline, &conditions, &mut to_simulate);
            log::info!(
                "<< finished branch '{}' at t={:.3}s ({} points)",
                status.flight_data().name(),
                status.time(),
                status.flight_data().len()
            );

            if status.flight_data().is_empty() {
                let branch = status.flight_data().name().to_string();
                status.add_warning(Warning::EmptyBranch { branch });
            }

            if let Err(e) = result {
                return Ok(self.finish_aborted(&mut pipeline, status, flight_data, e));
            }

            if to_simulate.is_empty() {
                // Last branch: end_simulation fires once, on every
                // listener, in registration order.
                pipeline.fire_end_simulation(&mut status, None);
            }
            flight_data.warnings_mut().add_all(status.warnings());
            let mut branch = status.take_flight_data();
            branch.freeze();
            flight_data.add_branch(branch);
        }

        flight_data.set_status(FlightDataStatus::Complete);
        if !flight_data.warnings().is_empty() {
            log::info!("warnings at end of run: {}", flight_data.warnings());
        }
        Ok(flight_data)
    }

    /// Abort path: fire `end_simulation` with the error, keep partial
    /// data, mark the result.
    fn finish_aborted(
        &mut self,
        pipeline: &mut ListenerPipeline,
        mut status: SimulationStatus,
        mut flight_data: FlightData,
        error: SimulationError,
    ) -> FlightData {
        log::warn!("run aborted: {error}");
        let abort_time = status.time();
        status
            .flight_data_mut()
            .add_event(FlightEvent::new(FlightEventKind::Abort, abort_time));
        pipeline.fire_end_simulation(&mut status, Some(&error));

        flight_data.warnings_mut().add_all(status.warnings());
        let mut branch = status.take_flight_data();
        branch.freeze();
        flight_data.add_branch(branch);
        flight_data.set_status(FlightDataStatus::Aborted);
        flight_data.set_abort_message(error.to_string());
        flight_data
    }

    /// Step one branch until its simulation ends.
    fn simulate_branch(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        conditions: &SimulationConditions,
        to_simulate: &mut VecDeque<SimulationStatus>,
    ) -> SimResult<()> {
        let mut deployed: HashSet<String> = HashSet::new();
        // Hard cap so a stalled stepper or an endlessly vetoed
        // SimulationEnd cannot spin forever.
        let max_steps = ((conditions.max_time / conditions.time_step).ceil() as u64)
            .saturating_mul(4)
            .saturating_add(10_000);
        let mut steps: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }

            // Drain due events (including any cascade) before physics.
            if self.handle_events(status, pipeline, to_simulate, &mut deployed)? {
                return Ok(());
            }

            if status.time() >= conditions.max_time {
                log::info!("maximum simulation time reached");
                self.queue_event(
                    status,
                    pipeline,
                    FlightEvent::new(FlightEventKind::SimulationEnd, status.time()),
                )?;
            } else {
                if pipeline.fire_pre_step(status)? {
                    match self.stepper.as_mut() {
                        Some(stepper) => stepper.step(status, pipeline, conditions.time_step)?,
                        None => {
                            return Err(SimulationError::Calculation {
                                time: status.time(),
                                message: "no stepper installed".into(),
                            })
                        }
                    }
                }
                pipeline.fire_post_step(status)?;

                self.detect_events(status, pipeline, conditions, &deployed)?;
            }

            steps += 1;
            if steps > max_steps {
                return Err(SimulationError::Abort { cause: AbortCause::TooManySteps });
            }
        }
    }

    /// Dispatch every event due at or before the current time. Returns
    /// true when the branch is finished.
    fn handle_events(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        to_simulate: &mut VecDeque<SimulationStatus>,
        deployed: &mut HashSet<String>,
    ) -> SimResult<bool> {
        loop {
            let due = match status.event_queue().peek() {
                Some(event) => event.time <= status.time() + TIME_EPSILON,
                None => false,
            };
            if !due {
                return Ok(false);
            }
            let Some(event) = status.event_queue_mut().poll() else {
                return Ok(false);
            };
            log::debug!("handling event: {event}");

            // Listeners first; a veto suppresses the default handling.
            if !pipeline.fire_handle_flight_event(status, &event)? {
                log::info!("default handling of {event} suppressed by listener");
                continue;
            }

            if status.is_landed() && event.kind != FlightEventKind::SimulationEnd {
                status.add_warning(Warning::EventAfterLanding);
                continue;
            }

            if self.default_handle(status, pipeline, &event, to_simulate, deployed)? {
                return Ok(true);
            }
        }
    }

    /// The engine's own response to an event. Returns true when the
    /// branch is finished.
    fn default_handle(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        event: &FlightEvent,
        to_simulate: &mut VecDeque<SimulationStatus>,
        deployed: &mut HashSet<String>,
    ) -> SimResult<bool> {
        match event.kind {
            FlightEventKind::Launch => {
                status.flight_data_mut().add_event(event.clone());
                let stage = {
                    let config = status.configuration();
                    config.stages.get(config.current_stage()).cloned()
                };
                if let Some(stage) = stage {
                    if let Some(motor) = &stage.motor {
                        let ignition = status.time() + motor.ignition_delay;
                        let ignite = FlightEvent::new(FlightEventKind::Ignition, ignition)
                            .with_source(stage.name.clone());
                        self.queue_event(status, pipeline, ignite)?;
                    }
                }
            }

            FlightEventKind::Ignition => {
                status.flight_data_mut().add_event(event.clone());
                let stage = status.configuration().current_stage();
                status.set_motor_state(Some(MotorState {
                    stage,
                    ignition_time: event.time,
                    burnout_reported: false,
                }));
                log::info!("motor ignition on stage {stage} at t={:.3}s", event.time);
            }

            FlightEventKind::Liftoff => {
                status.flight_data_mut().add_event(event.clone());
                status.set_liftoff(true);
                log::info!("liftoff at t={:.3}s", event.time);
            }

            FlightEventKind::LaunchRodCleared => {
                status.flight_data_mut().add_event(event.clone());
                status.set_launch_rod_cleared(true);
            }

            FlightEventKind::Burnout => {
                status.flight_data_mut().add_event(event.clone());
                let config = status.configuration();
                let stage_index = config.current_stage();
                let stage = config.stages.get(stage_index).cloned();
                if let Some(stage) = stage {
                    if let Some(device) = &stage.recovery_device {
                        if let DeploymentConfig::EjectionCharge { delay } = device.deployment {
                            let charge = FlightEvent::new(
                                FlightEventKind::EjectionCharge,
                                event.time + delay,
                            )
                            .with_source(device.name.clone());
                            self.queue_event(status, pipeline, charge)?;
                        }
                    }
                    if stage.separates_at_burnout {
                        let separation =
                            FlightEvent::new(FlightEventKind::StageSeparation, event.time)
                                .with_source(stage.name.clone());
                        self.queue_event(status, pipeline, separation)?;
                    }
                }
            }

            FlightEventKind::EjectionCharge => {
                status.flight_data_mut().add_event(event.clone());
                let mut deployment =
                    FlightEvent::new(FlightEventKind::RecoveryDeviceDeployment, event.time);
                if let Some(source) = &event.source {
                    deployment = deployment.with_source(source.clone());
                }
                self.queue_event(status, pipeline, deployment)?;
            }

            FlightEventKind::StageSeparation => {
                status.flight_data_mut().add_event(event.clone());
                self.separate_stage(status, pipeline, event, to_simulate)?;
            }

            FlightEventKind::Apogee => {
                status.flight_data_mut().add_event(event.clone());
                status.set_apogee_reached(true);
                log::info!("apogee at t={:.3}s, altitude {:.1}m", event.time, status.altitude());
                let devices: Vec<_> = status
                    .configuration()
                    .active_stages()
                    .iter()
                    .filter_map(|s| s.recovery_device.clone())
                    .collect();
                for device in devices {
                    if let DeploymentConfig::Apogee { delay } = device.deployment {
                        let deployment = FlightEvent::new(
                            FlightEventKind::RecoveryDeviceDeployment,
                            event.time + delay,
                        )
                        .with_source(device.name.clone());
                        self.queue_event(status, pipeline, deployment)?;
                    }
                }
            }

            FlightEventKind::Altitude => {
                // Scheduling marker: trigger the deployment it stands
                // for. Not recorded in the branch.
                let mut deployment =
                    FlightEvent::new(FlightEventKind::RecoveryDeviceDeployment, event.time);
                if let Some(source) = &event.source {
                    deployment = deployment.with_source(source.clone());
                }
                self.queue_event(status, pipeline, deployment)?;
            }

            FlightEventKind::RecoveryDeviceDeployment => {
                status.flight_data_mut().add_event(event.clone());
                self.deploy_recovery_device(status, event, deployed);
            }

            FlightEventKind::GroundHit => {
                status.flight_data_mut().add_event(event.clone());
                status.set_landed(true);
                log::info!("ground hit at t={:.3}s", event.time);
                self.queue_event(
                    status,
                    pipeline,
                    FlightEvent::new(FlightEventKind::SimulationEnd, event.time),
                )?;
            }

            FlightEventKind::SimulationEnd => {
                status.flight_data_mut().add_event(event.clone());
                return Ok(true);
            }

            FlightEventKind::Warn => {
                status.flight_data_mut().add_event(event.clone());
                if let Some(EventPayload::Warning(warning)) = &event.data {
                    status.add_warning(warning.clone());
                }
            }

            FlightEventKind::Abort => {
                status.flight_data_mut().add_event(event.clone());
                let cause = match &event.data {
                    Some(EventPayload::Abort(cause)) => *cause,
                    _ => AbortCause::TooManySteps,
                };
                return Err(SimulationError::Abort { cause });
            }
        }
        Ok(false)
    }

    /// Queue an event, giving listeners the chance to veto it first.
    fn queue_event(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        event: FlightEvent,
    ) -> SimResult<()> {
        if pipeline.fire_add_flight_event(status, &event)? {
            status.add_event(event);
        } else {
            log::info!("event {event} dropped by listener veto");
        }
        Ok(())
    }

    /// Detect threshold crossings after a step and queue the resulting
    /// events.
    fn detect_events(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        conditions: &SimulationConditions,
        deployed: &HashSet<String>,
    ) -> SimResult<()> {
        let time = status.time();
        let altitude = status.altitude();
        let vertical_velocity = status.velocity().z;

        if !status.is_liftoff() && altitude > 0.01 {
            self.queue_event(status, pipeline, FlightEvent::new(FlightEventKind::Liftoff, time))?;
        }

        if status.is_liftoff()
            && !status.is_launch_rod_cleared()
            && altitude > conditions.launch_rod_length
        {
            self.queue_event(
                status,
                pipeline,
                FlightEvent::new(FlightEventKind::LaunchRodCleared, time),
            )?;
        }

        if let Some(motor_state) = status.motor_state() {
            if !motor_state.burnout_reported {
                let stage = status.configuration().stages.get(motor_state.stage).cloned();
                if let Some(stage) = stage {
                    if let Some(motor) = &stage.motor {
                        if time - motor_state.ignition_time >= motor.burn_time {
                            status.set_motor_state(Some(MotorState {
                                burnout_reported: true,
                                ..motor_state
                            }));
                            let burnout = FlightEvent::new(FlightEventKind::Burnout, time)
                                .with_source(stage.name.clone());
                            self.queue_event(status, pipeline, burnout)?;
                        }
                    }
                }
            }
        }

        if status.is_liftoff() && !status.is_apogee_reached() && vertical_velocity < 0.0 {
            self.queue_event(status, pipeline, FlightEvent::new(FlightEventKind::Apogee, time))?;
        }

        if status.is_apogee_reached() {
            let triggers: Vec<_> = status
                .configuration()
                .active_stages()
                .iter()
                .filter_map(|s| s.recovery_device.clone())
                .filter(|d| !deployed.contains(&d.name))
                .filter_map(|d| match d.deployment {
                    DeploymentConfig::Altitude { altitude: target } if altitude <= target => {
                        Some((d.name.clone(), target))
                    }
                    _ => None,
                })
                .collect();
            for (device, target) in triggers {
                let trigger = FlightEvent::new(FlightEventKind::Altitude, time)
                    .with_source(device)
                    .with_data(EventPayload::Value(target));
                self.queue_event(status, pipeline, trigger)?;
            }
        }

        if status.is_liftoff() && altitude <= 0.0 && vertical_velocity < 0.0 {
            let mut position = status.position();
            position.z = 0.0;
            status.set_position(position);
            self.queue_event(status, pipeline, FlightEvent::new(FlightEventKind::GroundHit, time))?;
        }

        Ok(())
    }

    /// Drop the bottom stage: the sustainer keeps this status, the
    /// separated booster becomes its own branch, simulated afterwards.
    fn separate_stage(
        &mut self,
        status: &mut SimulationStatus,
        pipeline: &mut ListenerPipeline,
        event: &FlightEvent,
        to_simulate: &mut VecDeque<SimulationStatus>,
    ) -> SimResult<()> {
        let Some(booster_stage) = status.configuration_mut().separate_stage() else {
            log::warn!("stage separation with no stage to drop");
            return Ok(());
        };
        log::info!("stage '{}' separated at t={:.3}s", booster_stage.name, event.time);

        // Booster branch: same kinematics, only the dropped stage, motor
        // spent.
        let booster_config =
            FlightConfiguration::new(booster_stage.name.clone(), vec![booster_stage.clone()]);
        let mut booster_branch =
            FlightDataBranch::new(booster_stage.name.clone(), FlightDataType::time());
        booster_branch.add_point();
        booster_branch.set_value(&FlightDataType::time(), status.time());
        booster_branch.set_value(&FlightDataType::altitude(), status.altitude());
        let mut booster = SimulationStatus::new(booster_config, booster_branch);
        booster.set_time(status.time());
        booster.set_position(status.position());
        booster.set_velocity(status.velocity());
        booster.set_orientation(status.orientation());
        booster.set_liftoff(true);
        booster.set_launch_rod_cleared(true);
        to_simulate.push_back(booster);

        // Ignite the next stage's motor, if it has one.
        let stage = {
            let config = status.configuration();
            config.stages.get(config.current_stage()).cloned()
        };
        if let Some(stage) = stage {
            if let Some(motor) = &stage.motor {
                let ignition =
                    FlightEvent::new(FlightEventKind::Ignition, event.time + motor.ignition_delay)
                        .with_source(stage.name.clone());
                self.queue_event(status, pipeline, ignition)?;
            }
        }
        Ok(())
    }

    /// Open the recovery device named by the event's source (or all
    /// undeployed devices if no source is named).
    fn deploy_recovery_device(
        &mut self,
        status: &mut SimulationStatus,
        event: &FlightEvent,
        deployed: &mut HashSet<String>,
    ) {
        let devices: Vec<_> = status
            .configuration()
            .active_stages()
            .iter()
            .filter_map(|s| s.recovery_device.clone())
            .filter(|d| !deployed.contains(&d.name))
            .filter(|d| event.source.as_deref().map_or(true, |s| s == d.name))
            .collect();
        for device in devices {
            let speed = status.velocity().norm();
            if speed > DEPLOYMENT_SPEED_WARNING {
                status.add_warning(Warning::RecoveryDeploymentHighSpeed { speed });
            }
            log::info!(
                "recovery device '{}' deployed at t={:.3}s ({:.1} m/s)",
                device.name,
                event.time,
                speed
            );
            status.add_deployed_drag_area(device.drag_area);
            deployed.insert(device.name);
        }
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}
