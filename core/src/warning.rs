//! Non-fatal problems accumulated over a run.
//!
//! Warnings never stop a simulation. They collect in the run's
//! [`WarningSet`] and are merged into the final flight data.

use serde::{Deserialize, Serialize};

/// Every warning the engine or a listener can raise.
/// Variants are added as features land — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    NoRecoveryDevice,
    /// A non-system listener mutated simulation state or vetoed a phase.
    ListenersAffected,
    RecoveryDeploymentHighSpeed {
        speed: f64,
    },
    EmptyBranch {
        branch: String,
    },
    EventAfterLanding,
    Other {
        message: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecoveryDevice => write!(f, "no recovery device defined in configuration"),
            Self::ListenersAffected => write!(f, "listeners affected the simulation"),
            Self::RecoveryDeploymentHighSpeed { speed } => {
                write!(f, "recovery device deployed at high speed ({speed:.1} m/s)")
            }
            Self::EmptyBranch { branch } => {
                write!(f, "simulation branch '{branch}' produced no data")
            }
            Self::EventAfterLanding => write!(f, "flight event occurred after landing"),
            Self::Other { message } => f.write_str(message),
        }
    }
}

/// Ordered, deduplicating collection of warnings.
///
/// Insertion order is preserved; adding a warning already present is a
/// no-op, so repeated per-step offenders report once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningSet {
    warnings: Vec<Warning>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning if an equal one is not already present.
    /// Returns true if the warning was newly added.
    pub fn add(&mut self, warning: Warning) -> bool {
        if self.warnings.contains(&warning) {
            return false;
        }
        log::info!("warning raised: {warning}");
        self.warnings.push(warning);
        true
    }

    pub fn add_all(&mut self, other: &WarningSet) {
        for w in &other.warnings {
            self.add(w.clone());
        }
    }

    pub fn contains(&self, warning: &Warning) -> bool {
        self.warnings.contains(warning)
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }
}

impl std::fmt::Display for WarningSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, w) in self.warnings.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{w}")?;
        }
        Ok(())
    }
}
