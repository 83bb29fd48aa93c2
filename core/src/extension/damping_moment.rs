//! Publishes a derived damping-moment-coefficient channel.
//!
//! The coefficient estimates the pitch damping contribution of the
//! exhaust jet: propellant mass flow times the nozzle moment arm
//! squared, normalized by the dynamic-pressure reference moment. It is
//! computed from already-recorded channels after every step, which makes
//! this the reference example for derived-channel listeners.

use crate::conditions::SimulationConditions;
use crate::config::Config;
use crate::error::SimResult;
use crate::extension::SimulationExtension;
use crate::flight_data::FlightDataType;
use crate::listener::SimulationListener;
use crate::status::SimulationStatus;

const DEFAULT_NOZZLE_DISTANCE: f64 = 0.7;

pub struct DampingMoment {
    config: Config,
}

impl DampingMoment {
    pub fn new() -> Self {
        Self { config: Config::new() }
    }

    /// The channel this extension publishes.
    pub fn data_type() -> FlightDataType {
        FlightDataType::register("Damping moment coefficient", "Cdm", "")
    }
}

impl Default for DampingMoment {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationExtension for DampingMoment {
    fn id(&self) -> &'static str {
        "damping-moment"
    }

    fn name(&self) -> &'static str {
        "Damping moment coefficient"
    }

    fn description(&self) -> &'static str {
        "Records the estimated jet damping moment coefficient as a flight data channel"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn initialize(&self, conditions: &mut SimulationConditions) -> SimResult<()> {
        let nozzle_distance =
            self.config.get_double("nozzle-distance", DEFAULT_NOZZLE_DISTANCE);
        conditions
            .listeners_mut()
            .add(Box::new(DampingMomentListener::new(nozzle_distance)));
        Ok(())
    }
}

pub struct DampingMomentListener {
    nozzle_distance: f64,
    /// Previous step's (time, mass) for the mass flow estimate.
    previous: Option<(f64, f64)>,
}

impl DampingMomentListener {
    pub fn new(nozzle_distance: f64) -> Self {
        Self { nozzle_distance, previous: None }
    }

    fn data_type() -> FlightDataType {
        DampingMoment::data_type()
    }
}

impl SimulationListener for DampingMomentListener {
    fn name(&self) -> &'static str {
        "DampingMomentListener"
    }

    fn post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        let time = status.flight_data().get_last(&FlightDataType::time());
        let mass = status.flight_data().get_last(&FlightDataType::mass());
        let velocity = status.flight_data().get_last(&FlightDataType::total_velocity());
        let density = status.flight_data().get_last(&FlightDataType::air_density());
        let reference_area = status.configuration().drag_area();

        // Needs a previous sample and meaningful airspeed; the first
        // rows of the channel are NaN while the estimate warms up.
        let value = match self.previous {
            Some((t0, m0)) if time > t0 && velocity > 1.0 && reference_area > 0.0 => {
                let mass_flow = (m0 - mass).max(0.0) / (time - t0);
                let reference_moment =
                    0.5 * density * velocity * velocity * reference_area * self.nozzle_distance;
                mass_flow * self.nozzle_distance * self.nozzle_distance / reference_moment
            }
            _ => f64::NAN,
        };
        if time.is_finite() && mass.is_finite() {
            self.previous = Some((time, mass));
        }

        status.flight_data_mut().set_value(&Self::data_type(), value);
        Ok(())
    }
}
