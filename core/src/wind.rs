//! Deterministic wind model.
//!
//! RULE: nothing in the simulation may call a platform RNG. The wind
//! stream is derived from the run's master seed, so two runs with the
//! same seed see the same gusts.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

/// User-facing wind settings, part of the simulation conditions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindSettings {
    /// Mean horizontal wind speed, m/s.
    pub average: f64,
    /// Standard deviation of the turbulent component, m/s.
    pub std_deviation: f64,
}

impl Default for WindSettings {
    fn default() -> Self {
        Self { average: 2.0, std_deviation: 0.5 }
    }
}

/// First-order filtered turbulence around a mean wind speed.
///
/// Each sample mixes the previous output with a fresh Gaussian draw, which
/// gives gusts a short correlation time without the full pink-noise
/// machinery of a production wind model.
pub struct WindModel {
    settings: WindSettings,
    rng: Pcg64Mcg,
    state: f64,
}

impl WindModel {
    /// The wind stream gets its own seed domain, separated from any other
    /// consumer of the master seed by a fixed odd multiplier.
    pub fn new(settings: WindSettings, master_seed: u64) -> Self {
        let derived = master_seed ^ 0x9e37_79b9_7f4a_7c15u64;
        Self {
            settings,
            rng: Pcg64Mcg::seed_from_u64(derived),
            state: 0.0,
        }
    }

    /// Horizontal wind speed for the current step, m/s.
    pub fn sample(&mut self) -> f64 {
        const MIX: f64 = 0.95;
        let gust = self.gaussian() * self.settings.std_deviation;
        self.state = MIX * self.state + (1.0 - MIX) * gust;
        self.settings.average + self.state
    }

    /// Standard normal draw (Box-Muller, one branch).
    fn gaussian(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.rng.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}
