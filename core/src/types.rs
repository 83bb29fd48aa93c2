//! Shared primitive types used across the entire simulation.

/// Simulation time in seconds from launch.
pub type SimTime = f64;

/// The canonical run identifier.
pub type RunId = String;

/// Standard gravity, m/s^2.
pub const G0: f64 = 9.80665;

/// Sea-level air density, kg/m^3.
pub const RHO0: f64 = 1.225;

/// Atmospheric density scale height, m.
pub const SCALE_HEIGHT: f64 = 8_500.0;

/// Sea-level speed of sound, m/s.
pub const SPEED_OF_SOUND: f64 = 340.29;
