//! Listener dispatch contract tests.
//!
//! Registration order, the always-runs guarantee of end_simulation, veto
//! short-circuiting and the listeners-affected warning. These are the
//! invariants extensions rely on — breaking any of them breaks every
//! extension.

use ascent_core::conditions::{FlightConditions, SimulationConditions};
use ascent_core::configuration::{FlightConfiguration, Motor, Stage};
use ascent_core::engine::SimulationEngine;
use ascent_core::error::{SimResult, SimulationError};
use ascent_core::flight_data::FlightDataStatus;
use ascent_core::flight_event::{FlightEvent, FlightEventKind};
use ascent_core::listener::SimulationListener;
use ascent_core::pipeline::ListenerPipeline;
use ascent_core::status::SimulationStatus;
use ascent_core::stepper::{record_step, FlightStepper};
use ascent_core::warning::Warning;
use nalgebra::Vector3;
use std::sync::{Arc, Mutex};

/// Minimal stepper: climbs at a constant rate, one sample row per step.
struct StubStepper {
    climb_rate: f64,
}

impl FlightStepper for StubStepper {
    fn step(
        &mut self,
        status: &mut SimulationStatus,
        listeners: &mut ListenerPipeline,
        dt: f64,
    ) -> SimResult<()> {
        let mut conditions = match listeners.fire_pre_flight_conditions(status)? {
            Some(c) => c,
            None => FlightConditions::zero(),
        };
        listeners.fire_post_flight_conditions(status, &mut conditions)?;

        status.set_time(status.time() + dt);
        let mut position = status.position();
        position.z += self.climb_rate * dt;
        status.set_position(position);
        status.set_velocity(Vector3::new(0.0, 0.0, self.climb_rate));
        record_step(status, &conditions, 0.0, 1.0, 0.0);
        Ok(())
    }
}

fn single_stage() -> FlightConfiguration {
    FlightConfiguration::new(
        "pipeline-test",
        vec![Stage {
            name: "Single".into(),
            dry_mass: 0.1,
            drag_area: 0.002,
            motor: Some(Motor {
                designation: "C6".into(),
                thrust: 6.0,
                burn_time: 1.8,
                propellant_mass: 0.011,
                ignition_delay: 0.0,
            }),
            recovery_device: None,
            separates_at_burnout: false,
        }],
    )
}

/// Short run: dt 0.125, max_time 0.5, four stub steps exactly.
fn short_conditions() -> SimulationConditions {
    let mut conditions = SimulationConditions::new(single_stage());
    conditions.time_step = 0.125;
    conditions.max_time = 0.5;
    conditions
}

/// Logs every hook invocation as "name:hook" into a shared vector.
struct RecordingListener {
    tag: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    fn record(&self, hook: &str) {
        self.log.lock().unwrap().push(format!("{}:{hook}", self.tag));
    }
}

impl SimulationListener for RecordingListener {
    fn name(&self) -> &'static str {
        self.tag
    }

    fn is_system_listener(&self) -> bool {
        true
    }

    fn start_simulation(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
        self.record("start");
        Ok(())
    }

    fn end_simulation(&mut self, _status: &mut SimulationStatus, error: Option<&SimulationError>) {
        self.record(if error.is_some() { "end(err)" } else { "end" });
    }

    fn pre_step(&mut self, _status: &mut SimulationStatus) -> SimResult<bool> {
        self.record("pre");
        Ok(true)
    }

    fn post_step(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
        self.record("post");
        Ok(())
    }
}

fn run(conditions: SimulationConditions) -> ascent_core::flight_data::FlightData {
    let mut engine = SimulationEngine::with_stepper(Box::new(StubStepper { climb_rate: 40.0 }));
    engine.simulate(conditions).expect("simulation runs")
}

#[test]
fn listeners_fire_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut conditions = short_conditions();
    conditions
        .listeners_mut()
        .add(Box::new(RecordingListener { tag: "A", log: Arc::clone(&log) }));
    conditions
        .listeners_mut()
        .add(Box::new(RecordingListener { tag: "B", log: Arc::clone(&log) }));

    run(conditions);

    let log = log.lock().unwrap();
    assert_eq!(&log[0], "A:start");
    assert_eq!(&log[1], "B:start");
    assert_eq!(&log[log.len() - 2], "A:end");
    assert_eq!(&log[log.len() - 1], "B:end");

    // Within every phase A precedes B: at each index where A:pre appears,
    // the next entry for B must be B:pre, never the other way around.
    for pair in log.windows(2) {
        if pair[0] == "B:pre" {
            assert_ne!(pair[1], "A:pre", "B fired before A within one pre_step phase");
        }
    }
}

#[test]
fn end_simulation_runs_even_when_a_listener_fails() {
    struct FailAfter {
        remaining: u32,
    }
    impl SimulationListener for FailAfter {
        fn name(&self) -> &'static str {
            "FailAfter"
        }
        fn post_step(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
            if self.remaining == 0 {
                return Err(SimulationError::Listener {
                    name: "FailAfter".into(),
                    message: "deliberate failure".into(),
                });
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(FailAfter { remaining: 2 }));
    conditions
        .listeners_mut()
        .add(Box::new(RecordingListener { tag: "R", log: Arc::clone(&log) }));

    let data = run(conditions);

    assert_eq!(data.status(), FlightDataStatus::Aborted);
    assert!(data.abort_message().unwrap().contains("FailAfter"));
    let log = log.lock().unwrap();
    assert_eq!(
        log.last().map(String::as_str),
        Some("R:end(err)"),
        "end_simulation must run with the causing error on abort"
    );
    // Partial data survives the abort.
    assert!(data.branch(0).unwrap().len() > 0, "aborted run must keep its partial data");
}

#[test]
fn pre_step_veto_short_circuits_later_listeners() {
    struct VetoFirst {
        vetoes: u32,
    }
    impl SimulationListener for VetoFirst {
        fn name(&self) -> &'static str {
            "VetoFirst"
        }
        fn pre_step(&mut self, _status: &mut SimulationStatus) -> SimResult<bool> {
            if self.vetoes > 0 {
                self.vetoes -= 1;
                return Ok(false);
            }
            Ok(true)
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(VetoFirst { vetoes: 3 }));
    conditions
        .listeners_mut()
        .add(Box::new(RecordingListener { tag: "R", log: Arc::clone(&log) }));

    let data = run(conditions);

    let log = log.lock().unwrap();
    let pre_count = log.iter().filter(|e| *e == "R:pre").count();
    let post_count = log.iter().filter(|e| *e == "R:post").count();
    // Vetoed iterations never reach the later listener's pre_step, but
    // post_step fires on every iteration regardless.
    assert_eq!(
        post_count,
        pre_count + 3,
        "three vetoed iterations must skip pre_step on later listeners only"
    );
    // A veto from a non-system listener marks the run.
    assert!(data.warnings().contains(&Warning::ListenersAffected));
}

#[test]
fn add_flight_event_veto_drops_the_event() {
    struct DropLiftoff;
    impl SimulationListener for DropLiftoff {
        fn name(&self) -> &'static str {
            "DropLiftoff"
        }
        fn add_flight_event(
            &mut self,
            _status: &mut SimulationStatus,
            event: &FlightEvent,
        ) -> SimResult<bool> {
            Ok(event.kind != FlightEventKind::Liftoff)
        }
    }

    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(DropLiftoff));
    let data = run(conditions);

    let branch = data.branch(0).unwrap();
    assert!(
        !branch
            .events()
            .iter()
            .any(|e| e.kind == FlightEventKind::Liftoff),
        "a vetoed event must never be queued or recorded"
    );
    assert!(data.warnings().contains(&Warning::ListenersAffected));
}

#[test]
fn handle_flight_event_veto_suppresses_default_handling() {
    struct SuppressLiftoff;
    impl SimulationListener for SuppressLiftoff {
        fn name(&self) -> &'static str {
            "SuppressLiftoff"
        }
        fn handle_flight_event(
            &mut self,
            _status: &mut SimulationStatus,
            event: &FlightEvent,
        ) -> SimResult<bool> {
            Ok(event.kind != FlightEventKind::Liftoff)
        }
    }

    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(SuppressLiftoff));
    let data = run(conditions);

    // The event was queued and dispatched, but its default handling
    // (recording it, setting the liftoff flag) never ran.
    let branch = data.branch(0).unwrap();
    assert!(!branch
        .events()
        .iter()
        .any(|e| e.kind == FlightEventKind::Liftoff));
    assert!(data.warnings().contains(&Warning::ListenersAffected));
}

#[test]
fn non_system_mutation_raises_listeners_affected() {
    struct Nudge;
    impl SimulationListener for Nudge {
        fn name(&self) -> &'static str {
            "Nudge"
        }
        fn post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
            status.set_velocity(Vector3::new(0.0, 0.0, 1.0));
            Ok(())
        }
    }

    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(Nudge));
    let data = run(conditions);
    assert!(data.warnings().contains(&Warning::ListenersAffected));
}

#[test]
fn flight_condition_mutations_are_visible_to_later_listeners() {
    struct Thicken;
    impl SimulationListener for Thicken {
        fn name(&self) -> &'static str {
            "Thicken"
        }
        fn is_system_listener(&self) -> bool {
            true
        }
        fn post_flight_conditions(
            &mut self,
            _status: &mut SimulationStatus,
            conditions: &mut FlightConditions,
        ) -> SimResult<()> {
            conditions.density = 9.9;
            Ok(())
        }
    }

    struct ObserveDensity {
        seen: Arc<Mutex<Vec<f64>>>,
    }
    impl SimulationListener for ObserveDensity {
        fn name(&self) -> &'static str {
            "ObserveDensity"
        }
        fn is_system_listener(&self) -> bool {
            true
        }
        fn post_flight_conditions(
            &mut self,
            _status: &mut SimulationStatus,
            conditions: &mut FlightConditions,
        ) -> SimResult<()> {
            self.seen.lock().unwrap().push(conditions.density);
            Ok(())
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(Thicken));
    conditions
        .listeners_mut()
        .add(Box::new(ObserveDensity { seen: Arc::clone(&seen) }));
    run(conditions);

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(
        seen.iter().all(|d| *d == 9.9),
        "mutations from earlier listeners must be visible later in the same phase"
    );
}

#[test]
fn system_listener_mutation_raises_no_warning() {
    struct SystemNudge;
    impl SimulationListener for SystemNudge {
        fn name(&self) -> &'static str {
            "SystemNudge"
        }
        fn is_system_listener(&self) -> bool {
            true
        }
        fn post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
            status.set_velocity(Vector3::new(0.0, 0.0, 1.0));
            Ok(())
        }
    }

    let mut conditions = short_conditions();
    conditions.listeners_mut().add(Box::new(SystemNudge));
    let data = run(conditions);
    assert!(
        !data.warnings().contains(&Warning::ListenersAffected),
        "system listeners are exempt from the listeners-affected warning"
    );
}
