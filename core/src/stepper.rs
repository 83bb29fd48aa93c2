//! Numerical stepping.
//!
//! The stepper proper is an external collaborator behind the
//! [`FlightStepper`] trait; the engine only requires that one call to
//! `step` advances the status by one time step and records the step's
//! sample row before returning, so `post_step` listeners can read the
//! just-computed values with `get_last`.
//!
//! [`BasicStepper`] is a point-mass RK4 stepper (thrust, gravity,
//! quadratic drag, exponential atmosphere) good enough to exercise the
//! whole pipeline end to end.

use crate::conditions::FlightConditions;
use crate::error::{SimResult, SimulationError};
use crate::flight_data::FlightDataType;
use crate::pipeline::ListenerPipeline;
use crate::status::SimulationStatus;
use crate::types::{G0, RHO0, SCALE_HEIGHT, SPEED_OF_SOUND};
use crate::wind::{WindModel, WindSettings};
use nalgebra::Vector3;

pub trait FlightStepper {
    /// Advance `status` by `dt` seconds. Must fire the flight-conditions
    /// hooks on `listeners` around its force computation and append one
    /// sample row to the status' data branch.
    fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerPipeline,
        dt: f64,
    ) -> SimResult<()>;
}

/// Point-mass stepper with average-thrust motors and a filtered wind
/// stream.
pub struct BasicStepper {
    wind: WindModel,
}

impl BasicStepper {
    pub fn new(wind_settings: WindSettings, master_seed: u64) -> Self {
        Self { wind: WindModel::new(wind_settings, master_seed) }
    }

    /// Derived aerodynamic quantities for the current state.
    fn compute_conditions(&mut self, status: &SimulationStatus) -> FlightConditions {
        let wind_velocity = self.wind.sample();
        let relative = status.velocity() - Vector3::new(wind_velocity, 0.0, 0.0);
        let airspeed = relative.norm();
        let density = RHO0 * (-status.altitude().max(0.0) / SCALE_HEIGHT).exp();

        let axis = status.orientation() * Vector3::z();
        let aoa = if airspeed > 1.0 {
            (relative.dot(&axis) / airspeed).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        FlightConditions {
            airspeed,
            mach: airspeed / SPEED_OF_SOUND,
            aoa,
            wind_velocity,
            density,
            drag_area: status.configuration().drag_area() + status.deployed_drag_area(),
        }
    }

    /// Current thrust magnitude, N.
    fn thrust(&self, status: &SimulationStatus) -> f64 {
        let Some(motor_state) = status.motor_state() else {
            return 0.0;
        };
        let stages = &status.configuration().stages;
        let Some(motor) = stages.get(motor_state.stage).and_then(|s| s.motor.as_ref()) else {
            return 0.0;
        };
        motor.thrust_at(status.time() - motor_state.ignition_time)
    }

    /// Total mass of the active stack, accounting for burned propellant.
    fn mass(&self, status: &SimulationStatus) -> f64 {
        let config = status.configuration();
        let mut mass: f64 = config.active_stages().iter().map(|s| s.dry_mass).sum();
        for (index, stage) in config.stages.iter().enumerate() {
            if index < config.current_stage() {
                continue;
            }
            if let Some(motor) = &stage.motor {
                let burn = match status.motor_state() {
                    Some(ms) if ms.stage == index => status.time() - ms.ignition_time,
                    _ => 0.0,
                };
                mass += motor.propellant_at(burn);
            }
        }
        mass
    }

    fn acceleration(
        &self,
        velocity: Vector3<f64>,
        thrust: f64,
        thrust_axis: Vector3<f64>,
        mass: f64,
        conditions: &FlightConditions,
    ) -> Vector3<f64> {
        let gravity = Vector3::new(0.0, 0.0, -G0);
        let relative = velocity - Vector3::new(conditions.wind_velocity, 0.0, 0.0);
        let speed = relative.norm();
        let drag = if speed > 1e-9 {
            -0.5 * conditions.density * conditions.drag_area * speed * relative
        } else {
            Vector3::zeros()
        };
        thrust_axis * (thrust / mass) + drag / mass + gravity
    }
}

impl FlightStepper for BasicStepper {
    fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerPipeline,
        dt: f64,
    ) -> SimResult<()> {
        // Flight conditions, with listener interception around the
        // computation.
        let mut conditions = match listeners.fire_pre_flight_conditions(status)? {
            Some(overridden) => overridden,
            None => self.compute_conditions(status),
        };
        listeners.fire_post_flight_conditions(status, &mut conditions)?;

        let mass = self.mass(status);
        if !(mass > 0.0) {
            return Err(SimulationError::Calculation {
                time: status.time(),
                message: format!("non-positive mass {mass}"),
            });
        }
        let thrust = self.thrust(status);
        let thrust_axis = status.orientation() * Vector3::z();

        // RK4 on position and velocity; thrust and conditions held
        // constant over the step.
        let pos = status.position();
        let vel = status.velocity();
        let accel = |v: Vector3<f64>| self.acceleration(v, thrust, thrust_axis, mass, &conditions);

        let k1v = accel(vel);
        let k1p = vel;
        let k2v = accel(vel + k1v * (dt / 2.0));
        let k2p = vel + k1v * (dt / 2.0);
        let k3v = accel(vel + k2v * (dt / 2.0));
        let k3p = vel + k2v * (dt / 2.0);
        let k4v = accel(vel + k3v * dt);
        let k4p = vel + k3v * dt;

        let new_vel = vel + (k1v + 2.0 * k2v + 2.0 * k3v + k4v) * (dt / 6.0);
        let mut new_pos = pos + (k1p + 2.0 * k2p + 2.0 * k3p + k4p) * (dt / 6.0);

        // On the pad, thrust below weight must not push the rocket
        // underground.
        let mut clamped_vel = new_vel;
        if !status.is_liftoff() && new_pos.z < 0.0 {
            new_pos.z = 0.0;
            clamped_vel = Vector3::zeros();
        }

        let accel_magnitude = (new_vel - vel).norm() / dt;
        status.set_time(status.time() + dt);
        status.set_position(new_pos);
        status.set_velocity(clamped_vel);

        if !new_pos.z.is_finite() || !clamped_vel.norm().is_finite() {
            return Err(SimulationError::Calculation {
                time: status.time(),
                message: "state diverged to non-finite values".into(),
            });
        }

        record_step(status, &conditions, accel_magnitude, mass, thrust);
        Ok(())
    }
}

/// Append the standard sample row for the step just computed.
pub fn record_step(
    status: &mut SimulationStatus,
    conditions: &FlightConditions,
    acceleration: f64,
    mass: f64,
    thrust: f64,
) {
    let time = status.time();
    let altitude = status.altitude();
    let velocity = status.velocity();
    let branch = status.flight_data_mut();
    branch.add_point();
    branch.set_value(&FlightDataType::time(), time);
    branch.set_value(&FlightDataType::altitude(), altitude);
    branch.set_value(&FlightDataType::vertical_velocity(), velocity.z);
    branch.set_value(&FlightDataType::total_velocity(), velocity.norm());
    branch.set_value(&FlightDataType::acceleration(), acceleration);
    branch.set_value(&FlightDataType::mass(), mass);
    branch.set_value(&FlightDataType::thrust(), thrust);
    branch.set_value(&FlightDataType::mach_number(), conditions.mach);
    branch.set_value(&FlightDataType::angle_of_attack(), conditions.aoa);
    branch.set_value(&FlightDataType::wind_velocity(), conditions.wind_velocity);
    branch.set_value(&FlightDataType::air_density(), conditions.density);
}
