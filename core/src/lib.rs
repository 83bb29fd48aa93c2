//! ascent-core — event-driven rocket flight simulation pipeline.
//!
//! The crate is organized around a single run: a [`engine::SimulationEngine`]
//! drives a [`status::SimulationStatus`] through a strictly sequential step
//! loop, and a [`pipeline::ListenerPipeline`] fans every phase of each step
//! out to registered [`listener::SimulationListener`]s in registration order.
//! Listeners observe or mutate physical state, append derived channels to the
//! current [`flight_data::FlightDataBranch`], and raise or veto
//! [`flight_event::FlightEvent`]s.
//!
//! RULES:
//!   - Listeners execute in registration order, every phase, every step.
//!   - One run is single-threaded; listener instances are never shared
//!     across concurrent runs.
//!   - All randomness flows through the seeded wind model.
//!   - Expected aborts travel as `Err(SimulationError)`, never panics.

pub mod conditions;
pub mod config;
pub mod configuration;
pub mod engine;
pub mod error;
pub mod extension;
pub mod flight_data;
pub mod flight_event;
pub mod listener;
pub mod pipeline;
pub mod status;
pub mod stepper;
pub mod types;
pub mod warning;
pub mod wind;
