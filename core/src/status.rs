//! The mutable state record of one simulation branch.
//!
//! Exactly one thread owns a `SimulationStatus` for the duration of a
//! run. Listeners receive `&mut SimulationStatus` and mutate it in place;
//! every kinematic mutation bumps a modification counter so the pipeline
//! can tell when a non-system listener changed physics behind the
//! stepper's back.

use crate::configuration::FlightConfiguration;
use crate::flight_data::FlightDataBranch;
use crate::flight_event::{EventQueue, FlightEvent};
use crate::types::SimTime;
use crate::warning::{Warning, WarningSet};
use nalgebra::{UnitQuaternion, Vector3};

/// Burn state of the currently active motor.
#[derive(Debug, Clone, Copy)]
pub struct MotorState {
    /// Stage index the motor belongs to.
    pub stage: usize,
    /// Simulation time of ignition.
    pub ignition_time: SimTime,
    /// Burnout already reported as an event.
    pub burnout_reported: bool,
}

pub struct SimulationStatus {
    time: SimTime,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
    configuration: FlightConfiguration,
    motor_state: Option<MotorState>,
    flight_data: FlightDataBranch,
    warnings: WarningSet,
    event_queue: EventQueue,
    /// Extra drag area from deployed recovery devices, m^2.
    deployed_drag_area: f64,
    liftoff: bool,
    launch_rod_cleared: bool,
    apogee_reached: bool,
    landed: bool,
    mod_count: u64,
}

impl SimulationStatus {
    pub fn new(configuration: FlightConfiguration, flight_data: FlightDataBranch) -> Self {
        Self {
            time: 0.0,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            configuration,
            motor_state: None,
            flight_data,
            warnings: WarningSet::new(),
            event_queue: EventQueue::new(),
            deployed_drag_area: 0.0,
            liftoff: false,
            launch_rod_cleared: false,
            apogee_reached: false,
            landed: false,
            mod_count: 0,
        }
    }

    // ── kinematics (mutations bump mod_count) ──────────────────────

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn set_time(&mut self, time: SimTime) {
        self.time = time;
        self.mod_count += 1;
    }

    pub fn position(&self) -> Vector3<f64> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
        self.mod_count += 1;
    }

    /// Altitude above the launch site, m.
    pub fn altitude(&self) -> f64 {
        self.position.z
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vector3<f64>) {
        self.velocity = velocity;
        self.mod_count += 1;
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.orientation = orientation;
        self.mod_count += 1;
    }

    pub fn configuration(&self) -> &FlightConfiguration {
        &self.configuration
    }

    pub fn configuration_mut(&mut self) -> &mut FlightConfiguration {
        self.mod_count += 1;
        &mut self.configuration
    }

    pub fn motor_state(&self) -> Option<MotorState> {
        self.motor_state
    }

    pub fn set_motor_state(&mut self, state: Option<MotorState>) {
        self.motor_state = state;
        self.mod_count += 1;
    }

    pub fn deployed_drag_area(&self) -> f64 {
        self.deployed_drag_area
    }

    pub fn add_deployed_drag_area(&mut self, area: f64) {
        self.deployed_drag_area += area;
        self.mod_count += 1;
    }

    // ── flags ──────────────────────────────────────────────────────

    pub fn is_liftoff(&self) -> bool {
        self.liftoff
    }

    pub fn set_liftoff(&mut self, liftoff: bool) {
        self.liftoff = liftoff;
        self.mod_count += 1;
    }

    pub fn is_launch_rod_cleared(&self) -> bool {
        self.launch_rod_cleared
    }

    pub fn set_launch_rod_cleared(&mut self, cleared: bool) {
        self.launch_rod_cleared = cleared;
        self.mod_count += 1;
    }

    pub fn is_apogee_reached(&self) -> bool {
        self.apogee_reached
    }

    pub fn set_apogee_reached(&mut self, reached: bool) {
        self.apogee_reached = reached;
        self.mod_count += 1;
    }

    pub fn is_landed(&self) -> bool {
        self.landed
    }

    pub fn set_landed(&mut self, landed: bool) {
        self.landed = landed;
        self.mod_count += 1;
    }

    // ── data, warnings, events ─────────────────────────────────────

    /// Data writes do not count as "affecting the simulation": appending
    /// a derived channel is normal listener behavior.
    pub fn flight_data(&self) -> &FlightDataBranch {
        &self.flight_data
    }

    pub fn flight_data_mut(&mut self) -> &mut FlightDataBranch {
        &mut self.flight_data
    }

    pub(crate) fn take_flight_data(self) -> FlightDataBranch {
        self.flight_data
    }

    pub fn warnings(&self) -> &WarningSet {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: Warning) {
        self.warnings.add(warning);
    }

    /// Queue a flight event for dispatch before the next step. Queueing
    /// counts as a state modification.
    pub fn add_event(&mut self, event: FlightEvent) {
        log::debug!("queueing event: {event}");
        self.event_queue.add(event);
        self.mod_count += 1;
    }

    pub fn event_queue(&self) -> &EventQueue {
        &self.event_queue
    }

    pub(crate) fn event_queue_mut(&mut self) -> &mut EventQueue {
        &mut self.event_queue
    }

    /// Opaque modification counter, bumped by every kinematic mutation.
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }
}
