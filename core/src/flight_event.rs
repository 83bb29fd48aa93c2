//! Flight events — the discrete occurrences that drive the step loop.
//!
//! RULE: events communicate between the stepper, the engine and the
//! listeners. Detection code never acts on an event directly; it queues
//! the event and the engine dispatches it through the listener pipeline.

use crate::error::AbortCause;
use crate::types::SimTime;
use crate::warning::Warning;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Every kind of flight event.
/// Variants are added as features land — never removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightEventKind {
    Launch,
    Ignition,
    Liftoff,
    LaunchRodCleared,
    Burnout,
    EjectionCharge,
    StageSeparation,
    Apogee,
    /// Scheduling marker for altitude-triggered actions. Data sinks
    /// normally skip these.
    Altitude,
    RecoveryDeviceDeployment,
    GroundHit,
    SimulationEnd,
    Warn,
    Abort,
}

impl std::fmt::Display for FlightEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Launch => "LAUNCH",
            Self::Ignition => "IGNITION",
            Self::Liftoff => "LIFTOFF",
            Self::LaunchRodCleared => "LAUNCHROD",
            Self::Burnout => "BURNOUT",
            Self::EjectionCharge => "EJECTION_CHARGE",
            Self::StageSeparation => "STAGE_SEPARATION",
            Self::Apogee => "APOGEE",
            Self::Altitude => "ALTITUDE",
            Self::RecoveryDeviceDeployment => "RECOVERY_DEVICE_DEPLOYMENT",
            Self::GroundHit => "GROUND_HIT",
            Self::SimulationEnd => "SIMULATION_END",
            Self::Warn => "WARN",
            Self::Abort => "ABORT",
        };
        f.write_str(s)
    }
}

/// Optional typed payload attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Warning(Warning),
    Abort(AbortCause),
    /// A plain scalar, e.g. the target altitude of an `Altitude` event.
    Value(f64),
}

/// A tagged, timestamped occurrence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightEvent {
    pub kind: FlightEventKind,
    pub time: SimTime,
    /// Originating component (stage, motor, recovery device) by name.
    /// Diagnostic back-reference only; never dereferenced by the engine.
    pub source: Option<String>,
    pub data: Option<EventPayload>,
}

impl FlightEvent {
    pub fn new(kind: FlightEventKind, time: SimTime) -> Self {
        Self { kind, time, source: None, data: None }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_data(mut self, data: EventPayload) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for FlightEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at t={:.3}s", self.kind, self.time)?;
        if let Some(src) = &self.source {
            write!(f, " (source: {src})")?;
        }
        Ok(())
    }
}

/// Pending events of one simulation branch.
///
/// Ordered by event time; simultaneous events keep their insertion order
/// so a cascade is processed strictly FIFO.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct Queued {
    event: FlightEvent,
    seq: u64,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest (time, seq) pops
        // first.
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: FlightEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { event, seq });
    }

    /// Remove and return the earliest pending event.
    pub fn poll(&mut self) -> Option<FlightEvent> {
        self.heap.pop().map(|q| q.event)
    }

    /// The earliest pending event without removing it.
    pub fn peek(&self) -> Option<&FlightEvent> {
        self.heap.peek().map(|q| &q.event)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
