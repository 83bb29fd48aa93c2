//! sim-runner: headless flight simulation runner.
//!
//! Usage:
//!   sim-runner --seed 12345 --max-time 300
//!   sim-runner --extension csv-save --csv-dir ./out
//!   sim-runner --list-extensions

use anyhow::{bail, Result};
use ascent_core::conditions::SimulationConditions;
use ascent_core::configuration::{
    DeploymentConfig, FlightConfiguration, Motor, RecoveryDevice, Stage,
};
use ascent_core::engine::SimulationEngine;
use ascent_core::extension::ExtensionRegistry;
use ascent_core::flight_data::FlightDataStatus;
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let registry = ExtensionRegistry::with_builtins();

    if args.iter().any(|a| a == "--list-extensions") {
        println!("Available extensions:");
        for id in registry.ids() {
            println!("  {id}");
        }
        return Ok(());
    }

    let seed = parse_arg(&args, "--seed", 42u64);
    let time_step = parse_arg(&args, "--time-step", 0.05f64);
    let max_time = parse_arg(&args, "--max-time", 1200.0f64);
    let wind_average = parse_arg(&args, "--wind-avg", 2.0f64);
    let wind_deviation = parse_arg(&args, "--wind-sd", 0.5f64);
    let csv_dir = args
        .windows(2)
        .find(|w| w[0] == "--csv-dir")
        .map(|w| w[1].as_str())
        .unwrap_or(".");
    let extension_ids: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "--extension")
        .map(|w| w[1].as_str())
        .collect();

    println!("sim-runner");
    println!("  seed:       {seed}");
    println!("  time step:  {time_step} s");
    println!("  max time:   {max_time} s");
    println!("  wind:       {wind_average} ± {wind_deviation} m/s");
    if !extension_ids.is_empty() {
        println!("  extensions: {}", extension_ids.join(", "));
    }
    println!();

    let mut conditions = SimulationConditions::new(demo_configuration());
    conditions.seed = seed;
    conditions.time_step = time_step;
    conditions.max_time = max_time;
    conditions.wind.average = wind_average;
    conditions.wind.std_deviation = wind_deviation;

    for id in extension_ids {
        let Some(mut extension) = registry.create(id) else {
            bail!("unknown extension '{id}' (try --list-extensions)");
        };
        log::debug!("attaching extension '{id}'");
        if id == "csv-save" {
            extension.config_mut().set_text("directory", csv_dir);
        }
        conditions.add_extension(Arc::from(extension));
    }

    let mut engine = SimulationEngine::new();
    let data = engine.simulate(conditions)?;

    println!("=== FLIGHT SUMMARY ===");
    println!("  run id:       {}", data.run_id());
    println!("  status:       {:?}", data.status());
    if let Some(message) = data.abort_message() {
        println!("  abort:        {message}");
    }
    println!("  flight time:  {:.2} s", data.flight_time());
    println!("  apogee:       {:.1} m", data.apogee());
    println!("  max velocity: {:.1} m/s", data.max_velocity());
    println!("  max accel:    {:.1} m/s²", data.max_acceleration());

    println!();
    println!("=== BRANCHES ===");
    for branch in data.branches() {
        println!("  {:<12} {:>6} points, {} events", branch.name(), branch.len(), branch.events().len());
        for event in branch.events() {
            println!("    {event}");
        }
    }

    if !data.warnings().is_empty() {
        println!();
        println!("=== WARNINGS ===");
        for warning in data.warnings().iter() {
            println!("  {warning}");
        }
    }

    if data.status() == FlightDataStatus::Aborted {
        std::process::exit(1);
    }
    Ok(())
}

/// A two-stage demo rocket exercising separation, a booster branch and
/// both deployment styles.
fn demo_configuration() -> FlightConfiguration {
    FlightConfiguration::new(
        "demo two-stage",
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
                recovery_device: Some(RecoveryDevice {
                    name: "Booster streamer".into(),
                    drag_area: 0.05,
                    deployment: DeploymentConfig::EjectionCharge { delay: 1.0 },
                }),
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
                    deployment: DeploymentConfig::Apogee { delay: 1.0 },
                }),
                separates_at_burnout: false,
            },
        ],
    )
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
