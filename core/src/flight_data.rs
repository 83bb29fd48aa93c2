//! Time-series flight data: typed channels, branches and the final record.
//!
//! A [`FlightDataType`] identifies one measurable quantity. Types are
//! interned process-wide by name: registering the same name twice returns
//! the same instance, so every producer of "Altitude" writes to the same
//! channel. The intern table is append-only and entries are immutable.
//!
//! A [`FlightDataBranch`] holds one continuous path of a run (stage
//! separation opens a second branch). Channels in a branch are kept at
//! equal length at all times.

use crate::flight_event::FlightEvent;
use crate::types::RunId;
use crate::warning::WarningSet;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

// ── FlightDataType ─────────────────────────────────────────────────

#[derive(Debug)]
struct TypeInner {
    name: String,
    symbol: String,
    unit: String,
}

/// Interned identifier of a measurable quantity. Cheap to clone; equality
/// is by registry identity (one entry per name, for process lifetime).
#[derive(Debug, Clone)]
pub struct FlightDataType(Arc<TypeInner>);

static REGISTRY: OnceLock<Mutex<HashMap<String, FlightDataType>>> = OnceLock::new();

impl FlightDataType {
    /// Look up or create the type with the given name. Symbol and unit are
    /// only used on first registration; later calls return the existing
    /// instance unchanged.
    pub fn register(name: &str, symbol: &str, unit: &str) -> FlightDataType {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        // The registry is append-only, so a poisoned lock still holds
        // valid entries.
        let mut map = registry.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        map.entry(name.to_string())
            .or_insert_with(|| {
                FlightDataType(Arc::new(TypeInner {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    unit: unit.to_string(),
                }))
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn symbol(&self) -> &str {
        &self.0.symbol
    }

    pub fn unit(&self) -> &str {
        &self.0.unit
    }

    // Standard channels written by the engine and stepper.

    pub fn time() -> FlightDataType {
        Self::register("Time", "t", "s")
    }

    pub fn altitude() -> FlightDataType {
        Self::register("Altitude", "h", "m")
    }

    pub fn vertical_velocity() -> FlightDataType {
        Self::register("Vertical velocity", "Vz", "m/s")
    }

    pub fn total_velocity() -> FlightDataType {
        Self::register("Total velocity", "Vt", "m/s")
    }

    pub fn acceleration() -> FlightDataType {
        Self::register("Acceleration", "a", "m/s\u{b2}")
    }

    pub fn mass() -> FlightDataType {
        Self::register("Mass", "m", "kg")
    }

    pub fn thrust() -> FlightDataType {
        Self::register("Thrust", "T", "N")
    }

    pub fn mach_number() -> FlightDataType {
        Self::register("Mach number", "M", "")
    }

    pub fn angle_of_attack() -> FlightDataType {
        Self::register("Angle of attack", "\u{3b1}", "rad")
    }

    pub fn wind_velocity() -> FlightDataType {
        Self::register("Wind velocity", "Vw", "m/s")
    }

    pub fn air_density() -> FlightDataType {
        Self::register("Air density", "\u{3c1}", "kg/m\u{b3}")
    }
}

impl PartialEq for FlightDataType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for FlightDataType {}

impl std::hash::Hash for FlightDataType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl std::fmt::Display for FlightDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl Serialize for FlightDataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.name)
    }
}

// ── FlightDataBranch ───────────────────────────────────────────────

/// One continuous time-series path of a run.
///
/// Channels are stored in registration order. `add_point` opens a new
/// sample row (initialized to NaN in every channel); `set_value` writes
/// the current row. A channel registered mid-flight is back-filled with
/// NaN so all channels stay equal length.
#[derive(Debug, Clone)]
pub struct FlightDataBranch {
    name: String,
    channels: Vec<(FlightDataType, Vec<f64>)>,
    points: usize,
    events: Vec<FlightEvent>,
    frozen: bool,
}

impl FlightDataBranch {
    pub fn new(name: impl Into<String>, initial_type: FlightDataType) -> Self {
        Self {
            name: name.into(),
            channels: vec![(initial_type, Vec::new())],
            points: 0,
            events: Vec::new(),
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sample rows recorded so far.
    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Open a new sample row. Every channel grows by one NaN entry.
    pub fn add_point(&mut self) {
        debug_assert!(!self.frozen, "add_point on frozen branch");
        if self.frozen {
            return;
        }
        self.points += 1;
        for (_, values) in &mut self.channels {
            values.push(f64::NAN);
        }
    }

    /// Write `value` into the current (last) row of `dtype`, registering
    /// the channel with NaN back-fill if this is its first write.
    pub fn set_value(&mut self, dtype: &FlightDataType, value: f64) {
        debug_assert!(!self.frozen, "set_value on frozen branch");
        if self.frozen || self.points == 0 {
            return;
        }
        let points = self.points;
        let index = match self.channels.iter().position(|(t, _)| t == dtype) {
            Some(index) => index,
            None => {
                self.channels.push((dtype.clone(), vec![f64::NAN; points]));
                self.channels.len() - 1
            }
        };
        self.channels[index].1[points - 1] = value;
    }

    /// Last recorded sample of a channel, NaN if the channel is unknown
    /// or empty.
    pub fn get_last(&self, dtype: &FlightDataType) -> f64 {
        self.channels
            .iter()
            .find(|(t, _)| t == dtype)
            .and_then(|(_, v)| v.last().copied())
            .unwrap_or(f64::NAN)
    }

    /// The full historical series of a channel.
    pub fn get(&self, dtype: &FlightDataType) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|(t, _)| t == dtype)
            .map(|(_, v)| v.as_slice())
    }

    /// Channel types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &FlightDataType> {
        self.channels.iter().map(|(t, _)| t)
    }

    pub fn add_event(&mut self, event: FlightEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[FlightEvent] {
        &self.events
    }

    /// Maximum finite value of a channel over the whole branch.
    pub fn max_of(&self, dtype: &FlightDataType) -> f64 {
        self.get(dtype)
            .map(|v| v.iter().copied().filter(|x| x.is_finite()).fold(f64::NAN, f64::max))
            .unwrap_or(f64::NAN)
    }

    /// Make the branch immutable. Further writes are ignored (and assert
    /// in debug builds).
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

// ── FlightData ─────────────────────────────────────────────────────

/// Completion status of a run's data, so consumers can tell "no data"
/// from "aborted with partial data" from "complete".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightDataStatus {
    NotSimulated,
    Complete,
    Aborted,
    /// Data imported from outside the simulator.
    External,
}

/// The frozen final record of one run: all branches plus accumulated
/// warnings.
#[derive(Debug)]
pub struct FlightData {
    run_id: RunId,
    branches: Vec<FlightDataBranch>,
    warnings: WarningSet,
    status: FlightDataStatus,
    abort_message: Option<String>,
}

impl FlightData {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            branches: Vec::new(),
            warnings: WarningSet::new(),
            status: FlightDataStatus::NotSimulated,
            abort_message: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn add_branch(&mut self, branch: FlightDataBranch) {
        self.branches.push(branch);
    }

    pub fn branches(&self) -> &[FlightDataBranch] {
        &self.branches
    }

    pub fn branch(&self, index: usize) -> Option<&FlightDataBranch> {
        self.branches.get(index)
    }

    pub fn warnings(&self) -> &WarningSet {
        &self.warnings
    }

    pub fn warnings_mut(&mut self) -> &mut WarningSet {
        &mut self.warnings
    }

    pub fn status(&self) -> FlightDataStatus {
        self.status
    }

    pub fn set_status(&mut self, status: FlightDataStatus) {
        self.status = status;
    }

    /// User-facing description of why the run aborted, `None` when the
    /// run completed.
    pub fn abort_message(&self) -> Option<&str> {
        self.abort_message.as_deref()
    }

    pub fn set_abort_message(&mut self, message: impl Into<String>) {
        self.abort_message = Some(message.into());
    }

    /// Highest altitude over all branches, NaN if no data.
    pub fn apogee(&self) -> f64 {
        let t = FlightDataType::altitude();
        self.branches
            .iter()
            .map(|b| b.max_of(&t))
            .fold(f64::NAN, f64::max)
    }

    /// Highest total velocity over all branches, NaN if no data.
    pub fn max_velocity(&self) -> f64 {
        let t = FlightDataType::total_velocity();
        self.branches
            .iter()
            .map(|b| b.max_of(&t))
            .fold(f64::NAN, f64::max)
    }

    /// Highest acceleration magnitude over all branches, NaN if no data.
    pub fn max_acceleration(&self) -> f64 {
        let t = FlightDataType::acceleration();
        self.branches
            .iter()
            .map(|b| b.max_of(&t))
            .fold(f64::NAN, f64::max)
    }

    /// Final time stamp of the first branch, NaN if no data.
    pub fn flight_time(&self) -> f64 {
        self.branches
            .first()
            .map(|b| b.get_last(&FlightDataType::time()))
            .unwrap_or(f64::NAN)
    }
}

impl Default for FlightData {
    fn default() -> Self {
        Self::new()
    }
}
