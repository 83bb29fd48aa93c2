//! Flight configuration — which stages, motors and recovery devices are
//! live for one simulated variant of a design.
//!
//! The motor model here is deliberately minimal (average thrust over a
//! burn time). The full thrust-curve model is an external collaborator;
//! the pipeline only needs ignition, thrust-at-time and burnout.

use crate::types::SimTime;
use serde::{Deserialize, Serialize};

/// Average-thrust motor description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motor {
    pub designation: String,
    /// Average thrust over the burn, N.
    pub thrust: f64,
    /// Burn duration from ignition, s.
    pub burn_time: f64,
    /// Propellant mass consumed linearly over the burn, kg.
    pub propellant_mass: f64,
    /// Delay from the triggering event to ignition, s.
    pub ignition_delay: f64,
}

impl Motor {
    /// Thrust at `t` seconds after ignition.
    pub fn thrust_at(&self, t: SimTime) -> f64 {
        if t >= 0.0 && t < self.burn_time {
            self.thrust
        } else {
            0.0
        }
    }

    /// Propellant mass remaining at `t` seconds after ignition.
    pub fn propellant_at(&self, t: SimTime) -> f64 {
        if t <= 0.0 {
            self.propellant_mass
        } else if t >= self.burn_time {
            0.0
        } else {
            self.propellant_mass * (1.0 - t / self.burn_time)
        }
    }
}

/// When a recovery device opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "deploy", rename_all = "snake_case")]
pub enum DeploymentConfig {
    /// At apogee, plus an optional delay.
    Apogee { delay: SimTime },
    /// Descending through a fixed altitude.
    Altitude { altitude: f64 },
    /// A fixed time after motor burnout (motor ejection charge).
    EjectionCharge { delay: SimTime },
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDevice {
    pub name: String,
    /// Drag area (Cd * A) once deployed, m^2.
    pub drag_area: f64,
    pub deployment: DeploymentConfig,
}

/// One stage of the rocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Structural mass without motor, kg.
    pub dry_mass: f64,
    /// Reference drag area (Cd * A) of the stack from this stage up, m^2.
    pub drag_area: f64,
    pub motor: Option<Motor>,
    pub recovery_device: Option<RecoveryDevice>,
    /// Separate this stage after its motor burns out.
    pub separates_at_burnout: bool,
}

impl Stage {
    pub fn total_mass(&self) -> f64 {
        self.dry_mass + self.motor.as_ref().map_or(0.0, |m| m.propellant_mass)
    }
}

/// The active set of stages for one run. Stage 0 is the booster (bottom),
/// the last stage carries the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightConfiguration {
    pub name: String,
    pub stages: Vec<Stage>,
    /// Index of the lowest still-attached stage.
    current_stage: usize,
}

impl FlightConfiguration {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self { name: name.into(), stages, current_stage: 0 }
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    /// Stages still attached to the simulated body.
    pub fn active_stages(&self) -> &[Stage] {
        &self.stages[self.current_stage..]
    }

    /// The topmost stage, if any stage exists.
    pub fn top_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// Drop the current bottom stage. Returns the separated stage.
    pub fn separate_stage(&mut self) -> Option<Stage> {
        if self.current_stage + 1 >= self.stages.len() {
            return None;
        }
        let separated = self.stages[self.current_stage].clone();
        self.current_stage += 1;
        Some(separated)
    }

    pub fn has_motors(&self) -> bool {
        self.active_stages().iter().any(|s| s.motor.is_some())
    }

    pub fn has_recovery_device(&self) -> bool {
        self.active_stages().iter().any(|s| s.recovery_device.is_some())
    }

    /// Dry mass plus full propellant of all active stages, kg.
    pub fn total_mass(&self) -> f64 {
        self.active_stages().iter().map(Stage::total_mass).sum()
    }

    /// Drag area of the active stack: the bottom active stage's reference
    /// area dominates.
    pub fn drag_area(&self) -> f64 {
        self.active_stages().first().map_or(0.0, |s| s.drag_area)
    }
}
