//! Run setup (`SimulationConditions`) and per-step derived quantities
//! (`FlightConditions`).

use crate::configuration::FlightConfiguration;
use crate::extension::SimulationExtension;
use crate::pipeline::ListenerPipeline;
use crate::types::SimTime;
use crate::wind::WindSettings;
use std::sync::Arc;

/// Everything a run needs before stepping begins.
///
/// Constructed fresh for every run. Extensions attached here install
/// their listeners into the pipeline when the engine calls
/// `initialize()` on each of them, once, before `start_simulation`.
pub struct SimulationConditions {
    pub configuration: FlightConfiguration,
    /// Integration time step, s.
    pub time_step: SimTime,
    /// Hard stop for the run, s.
    pub max_time: SimTime,
    /// Launch site altitude above sea level, m.
    pub launch_site_altitude: f64,
    /// Guided launch rod length, m.
    pub launch_rod_length: f64,
    pub wind: WindSettings,
    /// Master seed; all run randomness derives from it.
    pub seed: u64,
    extensions: Vec<Arc<dyn SimulationExtension>>,
    listeners: ListenerPipeline,
}

impl SimulationConditions {
    pub fn new(configuration: FlightConfiguration) -> Self {
        Self {
            configuration,
            time_step: 0.05,
            max_time: 1200.0,
            launch_site_altitude: 0.0,
            launch_rod_length: 1.0,
            wind: WindSettings::default(),
            seed: 0,
            extensions: Vec::new(),
            listeners: ListenerPipeline::new(),
        }
    }

    /// Attach an extension to this run. Its listeners are installed when
    /// the engine initializes extensions, in attachment order.
    pub fn add_extension(&mut self, extension: Arc<dyn SimulationExtension>) {
        self.extensions.push(extension);
    }

    pub fn extensions(&self) -> &[Arc<dyn SimulationExtension>] {
        &self.extensions
    }

    pub(crate) fn take_extensions(&mut self) -> Vec<Arc<dyn SimulationExtension>> {
        std::mem::take(&mut self.extensions)
    }

    /// The run's listener list. Extensions push fresh listener instances
    /// here from `initialize()`.
    pub fn listeners_mut(&mut self) -> &mut ListenerPipeline {
        &mut self.listeners
    }

    pub fn listeners(&self) -> &ListenerPipeline {
        &self.listeners
    }

    pub(crate) fn take_listeners(&mut self) -> ListenerPipeline {
        std::mem::take(&mut self.listeners)
    }
}

/// Aerodynamic quantities derived once per step, before force
/// computation. Listeners may override these through the
/// pre/post flight-conditions hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightConditions {
    /// Air speed relative to the wind, m/s.
    pub airspeed: f64,
    pub mach: f64,
    /// Angle of attack, rad.
    pub aoa: f64,
    /// Horizontal wind speed, m/s.
    pub wind_velocity: f64,
    /// Local air density, kg/m^3.
    pub density: f64,
    /// Effective drag area (Cd * A) of the current configuration, m^2.
    pub drag_area: f64,
}

impl FlightConditions {
    pub fn zero() -> Self {
        Self {
            airspeed: 0.0,
            mach: 0.0,
            aoa: 0.0,
            wind_velocity: 0.0,
            density: crate::types::RHO0,
            drag_area: 0.0,
        }
    }
}
