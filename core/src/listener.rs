//! The extension point: a listener observes or intercepts every phase of
//! a simulation step.
//!
//! Every hook has a default no-op/continue implementation, so a concrete
//! listener implements only the subset it cares about. A listener
//! instance lives for exactly one run; the pipeline calls
//! `end_simulation` unconditionally, which makes it the release point for
//! any run-scoped resource the listener holds.

use crate::conditions::FlightConditions;
use crate::error::{SimResult, SimulationError};
use crate::flight_event::FlightEvent;
use crate::status::SimulationStatus;

pub trait SimulationListener {
    /// Stable name used in logs and listener-failure errors.
    fn name(&self) -> &'static str;

    /// System listeners are part of the engine itself; their mutations do
    /// not raise the listeners-affected warning.
    fn is_system_listener(&self) -> bool {
        false
    }

    /// Called once, before the first step. An `Err` aborts the run before
    /// any stepping occurs.
    fn start_simulation(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
        Ok(())
    }

    /// Called once, always — even when the run aborted. `error` carries
    /// the causing failure, `None` on normal completion. Cleanup only;
    /// this hook cannot fail.
    fn end_simulation(&mut self, _status: &mut SimulationStatus, _error: Option<&SimulationError>) {
    }

    /// Called before the stepper integrates. Returning `Ok(false)` skips
    /// the default handling of this step.
    fn pre_step(&mut self, _status: &mut SimulationStatus) -> SimResult<bool> {
        Ok(true)
    }

    /// Called after the stepper has integrated and recorded the step's
    /// data. Derived channels are published here via
    /// `status.flight_data_mut().set_value(..)`.
    fn post_step(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
        Ok(())
    }

    /// Called before flight conditions are computed. Returning
    /// `Ok(Some(conditions))` replaces the computation entirely.
    fn pre_flight_conditions(
        &mut self,
        _status: &mut SimulationStatus,
    ) -> SimResult<Option<FlightConditions>> {
        Ok(None)
    }

    /// Called after flight conditions are computed; may adjust them in
    /// place. Mutations are visible to listeners invoked later in the
    /// same phase.
    fn post_flight_conditions(
        &mut self,
        _status: &mut SimulationStatus,
        _conditions: &mut FlightConditions,
    ) -> SimResult<()> {
        Ok(())
    }

    /// Called when the engine is about to queue a detected event.
    /// Returning `Ok(false)` drops the event before it is queued.
    fn add_flight_event(
        &mut self,
        _status: &mut SimulationStatus,
        _event: &FlightEvent,
    ) -> SimResult<bool> {
        Ok(true)
    }

    /// Called once per dispatched event, in queue order. Returning
    /// `Ok(false)` suppresses the engine's default handling of the event
    /// (and remaining listeners are not consulted for it).
    fn handle_flight_event(
        &mut self,
        _status: &mut SimulationStatus,
        _event: &FlightEvent,
    ) -> SimResult<bool> {
        Ok(true)
    }
}
