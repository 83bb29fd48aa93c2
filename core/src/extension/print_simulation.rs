//! Logs the progress of a run: every flight event as it is handled, and
//! a one-line summary at the end. Mainly a debugging aid and the
//! smallest possible extension example.

use crate::conditions::SimulationConditions;
use crate::config::Config;
use crate::error::{SimResult, SimulationError};
use crate::extension::SimulationExtension;
use crate::flight_data::FlightDataType;
use crate::flight_event::FlightEvent;
use crate::listener::SimulationListener;
use crate::status::SimulationStatus;

pub struct PrintSimulation {
    config: Config,
}

impl PrintSimulation {
    pub fn new() -> Self {
        Self { config: Config::new() }
    }
}

impl Default for PrintSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationExtension for PrintSimulation {
    fn id(&self) -> &'static str {
        "print-simulation"
    }

    fn name(&self) -> &'static str {
        "Print simulation progress"
    }

    fn description(&self) -> &'static str {
        "Logs flight events and an end-of-run summary"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn initialize(&self, conditions: &mut SimulationConditions) -> SimResult<()> {
        conditions.listeners_mut().add(Box::new(PrintSimulationListener));
        Ok(())
    }
}

pub struct PrintSimulationListener;

impl SimulationListener for PrintSimulationListener {
    fn name(&self) -> &'static str {
        "PrintSimulationListener"
    }

    fn start_simulation(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        log::info!(
            "simulation started: configuration '{}', {} stage(s)",
            status.configuration().name,
            status.configuration().active_stages().len()
        );
        Ok(())
    }

    fn handle_flight_event(
        &mut self,
        status: &mut SimulationStatus,
        event: &FlightEvent,
    ) -> SimResult<bool> {
        log::info!("flight event: {event} (altitude {:.1} m)", status.altitude());
        Ok(true)
    }

    fn end_simulation(&mut self, status: &mut SimulationStatus, error: Option<&SimulationError>) {
        let altitude = status.flight_data().max_of(&FlightDataType::altitude());
        match error {
            Some(error) => log::info!(
                "simulation ended with error at t={:.2} s: {error}",
                status.time()
            ),
            None => log::info!(
                "simulation ended at t={:.2} s, peak altitude {altitude:.1} m",
                status.time()
            ),
        }
    }
}
