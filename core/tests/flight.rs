//! Full flights through the built-in point-mass stepper: the canonical
//! event sequence of a nominal flight, abort behavior and cooperative
//! cancellation.

use ascent_core::conditions::SimulationConditions;
use ascent_core::configuration::{
    DeploymentConfig, FlightConfiguration, Motor, RecoveryDevice, Stage,
};
use ascent_core::engine::SimulationEngine;
use ascent_core::error::{SimResult, SimulationError};
use ascent_core::flight_data::FlightDataStatus;
use ascent_core::flight_event::FlightEventKind;
use ascent_core::listener::SimulationListener;
use ascent_core::status::SimulationStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn single_stage_with_chute() -> FlightConfiguration {
    FlightConfiguration::new(
        "flight-test",
        vec![Stage {
            name: "Single".into(),
            dry_mass: 0.08,
            drag_area: 0.002,
            motor: Some(Motor {
                designation: "C6".into(),
                thrust: 6.0,
                burn_time: 1.8,
                propellant_mass: 0.011,
                ignition_delay: 0.0,
            }),
            recovery_device: Some(RecoveryDevice {
                name: "Chute".into(),
                drag_area: 0.4,
                deployment: DeploymentConfig::Apogee { delay: 0.0 },
            }),
            separates_at_burnout: false,
        }],
    )
}

/// Still air so the flight is deterministic.
fn calm_conditions() -> SimulationConditions {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut conditions = SimulationConditions::new(single_stage_with_chute());
    conditions.wind.average = 0.0;
    conditions.wind.std_deviation = 0.0;
    conditions
}

fn event_position(events: &[ascent_core::flight_event::FlightEvent], kind: FlightEventKind) -> usize {
    events
        .iter()
        .position(|e| e.kind == kind)
        .unwrap_or_else(|| panic!("event {kind} missing from flight"))
}

#[test]
fn nominal_flight_produces_the_canonical_event_sequence() {
    let mut engine = SimulationEngine::new();
    let data = engine.simulate(calm_conditions()).expect("simulation runs");

    assert_eq!(data.status(), FlightDataStatus::Complete);
    assert!(data.abort_message().is_none());

    let branch = data.branch(0).expect("one branch");
    let events = branch.events();
    let order = [
        FlightEventKind::Launch,
        FlightEventKind::Ignition,
        FlightEventKind::Liftoff,
        FlightEventKind::LaunchRodCleared,
        FlightEventKind::Burnout,
        FlightEventKind::Apogee,
        FlightEventKind::RecoveryDeviceDeployment,
        FlightEventKind::GroundHit,
        FlightEventKind::SimulationEnd,
    ];
    let positions: Vec<usize> = order.iter().map(|k| event_position(events, *k)).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "events out of order: {events:?}"
    );

    // Physical sanity of the summary figures.
    assert!(data.apogee() > 50.0, "apogee {:.1} m implausibly low", data.apogee());
    assert!(data.max_velocity() > 20.0, "max velocity {:.1} m/s implausibly low", data.max_velocity());
    assert!(data.flight_time() > 10.0, "flight time {:.1} s implausibly short", data.flight_time());

    // The chute opened at apogee, so touchdown is slow.
    let apogee_time = events[event_position(events, FlightEventKind::Apogee)].time;
    let ground_time = events[event_position(events, FlightEventKind::GroundHit)].time;
    assert!(ground_time - apogee_time > 10.0, "descent under canopy should be slow");
}

#[test]
fn two_stage_flight_spawns_a_booster_branch() {
    let config = FlightConfiguration::new(
        "two-stage",
        vec![
            Stage {
                name: "Booster".into(),
                dry_mass: 0.8,
                drag_area: 0.004,
                motor: Some(Motor {
                    designation: "E30".into(),
                    thrust: 30.0,
                    burn_time: 2.0,
                    propellant_mass: 0.060,
                    ignition_delay: 0.0,
                }),
                recovery_device: None,
                separates_at_burnout: true,
            },
            Stage {
                name: "Sustainer".into(),
                dry_mass: 0.5,
                drag_area: 0.002,
                motor: Some(Motor {
                    designation: "D12".into(),
                    thrust: 12.0,
                    burn_time: 1.6,
                    propellant_mass: 0.021,
                    ignition_delay: 0.5,
                }),
                recovery_device: Some(RecoveryDevice {
                    name: "Main chute".into(),
                    drag_area: 0.4,
                    deployment: DeploymentConfig::Apogee { delay: 0.0 },
                }),
                separates_at_burnout: false,
            },
        ],
    );
    let mut conditions = SimulationConditions::new(config);
    conditions.wind.average = 0.0;
    conditions.wind.std_deviation = 0.0;

    let mut engine = SimulationEngine::new();
    let data = engine.simulate(conditions).expect("simulation runs");

    assert_eq!(data.status(), FlightDataStatus::Complete);
    assert_eq!(data.branches().len(), 2, "separation must open a booster branch");
    assert_eq!(data.branch(1).unwrap().name(), "Booster");

    let main = data.branch(0).unwrap();
    assert!(main
        .events()
        .iter()
        .any(|e| e.kind == FlightEventKind::StageSeparation));
    // The booster branch flies on its own and lands.
    let booster = data.branch(1).unwrap();
    assert!(booster
        .events()
        .iter()
        .any(|e| e.kind == FlightEventKind::GroundHit));
}

/// Flips a flag when end_simulation runs, recording whether an error was
/// attached.
struct EndProbe {
    called: Arc<AtomicBool>,
    with_error: Arc<AtomicBool>,
}

impl SimulationListener for EndProbe {
    fn name(&self) -> &'static str {
        "EndProbe"
    }

    fn end_simulation(&mut self, _status: &mut SimulationStatus, error: Option<&SimulationError>) {
        self.called.store(true, Ordering::SeqCst);
        self.with_error.store(error.is_some(), Ordering::SeqCst);
    }
}

#[test]
fn listener_failure_aborts_with_partial_data() {
    struct FailLate;
    impl SimulationListener for FailLate {
        fn name(&self) -> &'static str {
            "FailLate"
        }
        fn post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
            if status.time() > 1.0 {
                return Err(SimulationError::Listener {
                    name: "FailLate".into(),
                    message: "gave up mid-ascent".into(),
                });
            }
            Ok(())
        }
    }

    let called = Arc::new(AtomicBool::new(false));
    let with_error = Arc::new(AtomicBool::new(false));
    let mut conditions = calm_conditions();
    conditions.listeners_mut().add(Box::new(FailLate));
    conditions.listeners_mut().add(Box::new(EndProbe {
        called: Arc::clone(&called),
        with_error: Arc::clone(&with_error),
    }));

    let mut engine = SimulationEngine::new();
    let data = engine.simulate(conditions).expect("abort is not an Err");

    assert_eq!(data.status(), FlightDataStatus::Aborted);
    assert!(data.abort_message().unwrap().contains("FailLate"));
    assert!(data.branch(0).unwrap().len() > 10, "the ascent up to the failure must be kept");
    assert!(called.load(Ordering::SeqCst), "end_simulation must run on abort");
    assert!(with_error.load(Ordering::SeqCst), "end_simulation must see the causing error");
}

#[test]
fn cancellation_stops_the_run_and_still_ends_cleanly() {
    let called = Arc::new(AtomicBool::new(false));
    let with_error = Arc::new(AtomicBool::new(false));
    let mut conditions = calm_conditions();
    conditions.listeners_mut().add(Box::new(EndProbe {
        called: Arc::clone(&called),
        with_error: Arc::clone(&with_error),
    }));

    let mut engine = SimulationEngine::new();
    engine.cancellation_token().cancel();
    let data = engine.simulate(conditions).expect("cancellation is not an Err");

    assert_eq!(data.status(), FlightDataStatus::Aborted);
    assert!(data.abort_message().unwrap().contains("cancelled"));
    assert!(called.load(Ordering::SeqCst), "end_simulation must run on cancellation");
    assert!(with_error.load(Ordering::SeqCst));
}

#[test]
fn misconfigured_rocket_refuses_to_simulate() {
    // No motors at all: not even one step can be taken.
    let config = FlightConfiguration::new(
        "no-motors",
        vec![Stage {
            name: "Glider".into(),
            dry_mass: 0.1,
            drag_area: 0.002,
            motor: None,
            recovery_device: None,
            separates_at_burnout: false,
        }],
    );
    let mut engine = SimulationEngine::new();
    let result = engine.simulate(SimulationConditions::new(config));
    assert!(matches!(result, Err(SimulationError::Abort { .. })));
}
