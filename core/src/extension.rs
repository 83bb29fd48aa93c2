//! Simulation extensions — user-configurable bundles that install
//! listeners into a run.
//!
//! RULE: an extension is reusable across runs; `initialize` must install
//! freshly constructed listener instances every time, never a shared
//! singleton with mutable fields. The engine calls `initialize` exactly
//! once per run, before `start_simulation`.
//!
//! Extensions are looked up through an explicit [`ExtensionRegistry`]
//! populated at startup — a run-scoped object passed to whoever loads
//! simulation definitions. No reflection, no global mutable state.

pub mod air_start;
pub mod csv_save;
pub mod damping_moment;
pub mod print_simulation;

use crate::conditions::SimulationConditions;
use crate::config::Config;
use crate::error::SimResult;
use std::collections::BTreeMap;

pub trait SimulationExtension: Send + Sync {
    /// Stable identifier used by the registry and in saved definitions.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    fn config(&self) -> &Config;

    /// Mutable configuration access, for edit-time only.
    fn config_mut(&mut self) -> &mut Config;

    /// Install this extension's listeners into the run. Called once per
    /// run on a fresh `SimulationConditions`.
    fn initialize(&self, conditions: &mut SimulationConditions) -> SimResult<()>;
}

type ExtensionProvider = Box<dyn Fn() -> Box<dyn SimulationExtension> + Send + Sync>;

/// Explicit id-to-constructor map, resolved at startup.
#[derive(Default)]
pub struct ExtensionRegistry {
    providers: BTreeMap<&'static str, ExtensionProvider>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the extensions shipped in this
    /// crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("air-start", || Box::new(air_start::AirStart::new()));
        registry.register("csv-save", || Box::new(csv_save::CsvSave::new()));
        registry.register("damping-moment", || {
            Box::new(damping_moment::DampingMoment::new())
        });
        registry.register("print-simulation", || {
            Box::new(print_simulation::PrintSimulation::new())
        });
        registry
    }

    pub fn register(
        &mut self,
        id: &'static str,
        provider: impl Fn() -> Box<dyn SimulationExtension> + Send + Sync + 'static,
    ) {
        self.providers.insert(id, Box::new(provider));
    }

    /// Construct a fresh extension instance, `None` for unknown ids.
    pub fn create(&self, id: &str) -> Option<Box<dyn SimulationExtension>> {
        self.providers.get(id).map(|p| p())
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_creates_fresh_instances() {
        let registry = ExtensionRegistry::with_builtins();
        let a = registry.create("air-start").unwrap();
        let mut b = registry.create("air-start").unwrap();
        b.config_mut().set_double("altitude", 500.0);
        // Instances are independent.
        assert_eq!(a.config().get_double("altitude", 0.0), 0.0);
        assert_eq!(b.config().get_double("altitude", 0.0), 500.0);
    }

    #[test]
    fn unknown_id_yields_none() {
        let registry = ExtensionRegistry::with_builtins();
        assert!(registry.create("no-such-extension").is_none());
    }

    #[test]
    fn builtins_are_listed() {
        let registry = ExtensionRegistry::with_builtins();
        let ids: Vec<_> = registry.ids().collect();
        assert!(ids.contains(&"csv-save"));
        assert!(ids.contains(&"air-start"));
        assert!(ids.contains(&"damping-moment"));
        assert!(ids.contains(&"print-simulation"));
    }
}
