//! Listener dispatch.
//!
//! RULES (the dispatch contract):
//!   - Listeners fire in registration order, for every phase.
//!   - Mutation hooks (`start`, `end`, `post_step`,
//!     `post_flight_conditions`) always visit every listener.
//!   - Veto hooks (`pre_step`, `add_flight_event`, `handle_flight_event`)
//!     stop at the first `false`: the phase's default behavior is
//!     suppressed and remaining listeners are not consulted.
//!   - `end_simulation` runs unconditionally, once, even after an abort.
//!   - A non-system listener that mutates status or vetoes a phase raises
//!     `Warning::ListenersAffected`.

use crate::conditions::FlightConditions;
use crate::error::{SimResult, SimulationError};
use crate::flight_event::FlightEvent;
use crate::listener::SimulationListener;
use crate::status::SimulationStatus;
use crate::warning::Warning;

/// Registration-ordered listener list for one run.
#[derive(Default)]
pub struct ListenerPipeline {
    listeners: Vec<Box<dyn SimulationListener>>,
}

impl ListenerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn SimulationListener>) {
        log::debug!("registering listener '{}'", listener.name());
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Fire `start_simulation` on every listener. Any error aborts before
    /// stepping begins.
    pub fn fire_start_simulation(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            listener.start_simulation(status)?;
            Self::check_affected(status, listener.as_ref(), before);
        }
        Ok(())
    }

    /// Fire `end_simulation` on every listener, passing the causing error
    /// if the run failed. This is the one hook that always runs.
    pub fn fire_end_simulation(
        &mut self,
        status: &mut SimulationStatus,
        error: Option<&SimulationError>,
    ) {
        for listener in &mut self.listeners {
            listener.end_simulation(status, error);
        }
    }

    /// Fire `pre_step`. Returns false if any listener vetoed the step.
    pub fn fire_pre_step(&mut self, status: &mut SimulationStatus) -> SimResult<bool> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            let proceed = listener.pre_step(status)?;
            Self::check_affected(status, listener.as_ref(), before);
            if !proceed {
                Self::warn_affected(status, listener.as_ref());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fire `post_step` on every listener; no veto, every listener runs.
    pub fn fire_post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            listener.post_step(status)?;
            Self::check_affected(status, listener.as_ref(), before);
        }
        Ok(())
    }

    /// Fire `pre_flight_conditions`. The first listener returning
    /// `Some(..)` overrides the computation for this step.
    pub fn fire_pre_flight_conditions(
        &mut self,
        status: &mut SimulationStatus,
    ) -> SimResult<Option<FlightConditions>> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            let overriding = listener.pre_flight_conditions(status)?;
            Self::check_affected(status, listener.as_ref(), before);
            if let Some(conditions) = overriding {
                Self::warn_affected(status, listener.as_ref());
                return Ok(Some(conditions));
            }
        }
        Ok(None)
    }

    /// Fire `post_flight_conditions` on every listener. Mutations are
    /// visible to listeners later in the chain.
    pub fn fire_post_flight_conditions(
        &mut self,
        status: &mut SimulationStatus,
        conditions: &mut FlightConditions,
    ) -> SimResult<()> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            let snapshot = conditions.clone();
            listener.post_flight_conditions(status, conditions)?;
            Self::check_affected(status, listener.as_ref(), before);
            if *conditions != snapshot {
                Self::warn_affected(status, listener.as_ref());
            }
        }
        Ok(())
    }

    /// Fire `add_flight_event`. Returns false if the event must be
    /// dropped instead of queued.
    pub fn fire_add_flight_event(
        &mut self,
        status: &mut SimulationStatus,
        event: &FlightEvent,
    ) -> SimResult<bool> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            let keep = listener.add_flight_event(status, event)?;
            Self::check_affected(status, listener.as_ref(), before);
            if !keep {
                Self::warn_affected(status, listener.as_ref());
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fire `handle_flight_event`. Returns false if default handling of
    /// the event must be suppressed.
    pub fn fire_handle_flight_event(
        &mut self,
        status: &mut SimulationStatus,
        event: &FlightEvent,
    ) -> SimResult<bool> {
        for listener in &mut self.listeners {
            let before = status.mod_count();
            let proceed = listener.handle_flight_event(status, event)?;
            Self::check_affected(status, listener.as_ref(), before);
            if !proceed {
                Self::warn_affected(status, listener.as_ref());
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_affected(
        status: &mut SimulationStatus,
        listener: &dyn SimulationListener,
        mod_count_before: u64,
    ) {
        if status.mod_count() != mod_count_before {
            Self::warn_affected(status, listener);
        }
    }

    fn warn_affected(status: &mut SimulationStatus, listener: &dyn SimulationListener) {
        if !listener.is_system_listener() {
            log::info!("non-system listener '{}' affected the simulation", listener.name());
            status.add_warning(Warning::ListenersAffected);
        }
    }
}
