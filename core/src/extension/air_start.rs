//! Starts the simulation mid-air instead of on the pad.
//!
//! The listener moves the rocket to the configured altitude and vertical
//! velocity once, before the first step. It is a deliberate physics
//! mutation by a non-system listener, so the run carries the
//! listeners-affected warning.

use crate::conditions::SimulationConditions;
use crate::config::Config;
use crate::error::SimResult;
use crate::extension::SimulationExtension;
use crate::listener::SimulationListener;
use crate::status::SimulationStatus;

const DEFAULT_ALTITUDE: f64 = 304.8;
const DEFAULT_VELOCITY: f64 = 0.0;

pub struct AirStart {
    config: Config,
}

impl AirStart {
    pub fn new() -> Self {
        Self { config: Config::new() }
    }
}

impl Default for AirStart {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationExtension for AirStart {
    fn id(&self) -> &'static str {
        "air-start"
    }

    fn name(&self) -> &'static str {
        "Air start"
    }

    fn description(&self) -> &'static str {
        "Begins the simulation at a configured altitude and vertical velocity"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn initialize(&self, conditions: &mut SimulationConditions) -> SimResult<()> {
        let altitude = self.config.get_double("altitude", DEFAULT_ALTITUDE);
        let velocity = self.config.get_double("velocity", DEFAULT_VELOCITY);
        conditions
            .listeners_mut()
            .add(Box::new(AirStartListener { altitude, velocity }));
        Ok(())
    }
}

pub struct AirStartListener {
    altitude: f64,
    velocity: f64,
}

impl SimulationListener for AirStartListener {
    fn name(&self) -> &'static str {
        "AirStartListener"
    }

    fn start_simulation(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        let mut position = status.position();
        position.z = self.altitude;
        status.set_position(position);

        let mut velocity = status.velocity();
        velocity.z = self.velocity;
        status.set_velocity(velocity);

        log::info!(
            "air start: altitude {:.1} m, vertical velocity {:.1} m/s",
            self.altitude,
            self.velocity
        );
        Ok(())
    }
}
