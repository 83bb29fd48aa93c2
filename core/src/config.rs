//! Extension configuration bag.
//!
//! A `Config` maps string keys to primitive values and is persisted as
//! part of the simulation definition, so every `(key, value, type)`
//! triple must round-trip losslessly through JSON. Lookups never fail:
//! an absent or wrongly-typed key falls back to the caller's default.
//!
//! Setters notify change subscribers so document-dirty tracking can
//! react. Change notification is a configuration-time concern and must
//! not be triggered from inside a running simulation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Double(f64),
    Text(String),
    List(Vec<ConfigValue>),
}

type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Key-value configuration with defaulting lookups and change
/// notification.
#[derive(Default)]
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
    subscribers: Vec<ChangeCallback>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    // ── lookups (never fail) ───────────────────────────────────────

    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(ConfigValue::Double(v)) => *v,
            _ => default,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ConfigValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn get_text<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.values.get(key) {
            Some(ConfigValue::Text(v)) => v.as_str(),
            _ => default,
        }
    }

    pub fn get_list(&self, key: &str) -> &[ConfigValue] {
        match self.values.get(key) {
            Some(ConfigValue::List(v)) => v.as_slice(),
            _ => &[],
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    // ── setters (fire change notification) ─────────────────────────

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.set(key, ConfigValue::Double(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, ConfigValue::Bool(value));
    }

    pub fn set_text(&mut self, key: &str, value: impl Into<String>) {
        self.set(key, ConfigValue::Text(value.into()));
    }

    pub fn set_list(&mut self, key: &str, value: Vec<ConfigValue>) {
        self.set(key, ConfigValue::List(value));
    }

    fn set(&mut self, key: &str, value: ConfigValue) {
        let old = self.values.insert(key.to_string(), value);
        if old.as_ref() != self.values.get(key) {
            self.fire_change();
        }
    }

    /// Subscribe to change notifications.
    pub fn on_change(&mut self, callback: impl Fn() + Send + Sync + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn fire_change(&self) {
        for subscriber in &self.subscribers {
            subscriber();
        }
    }

    // ── persistence ────────────────────────────────────────────────

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.values)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let values: BTreeMap<String, ConfigValue> = serde_json::from_str(json)?;
        Ok(Self { values, subscribers: Vec::new() })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config").field("values", &self.values).finish()
    }
}

impl Clone for Config {
    /// Subscribers are not cloned; a copied config starts with no
    /// observers.
    fn clone(&self) -> Self {
        Self { values: self.values.clone(), subscribers: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn missing_key_returns_default_idempotently() {
        let config = Config::new();
        for _ in 0..10 {
            assert_eq!(config.get_double("missingKey", 3.5), 3.5);
        }
        let mut config = config;
        config.set_double("otherKey", 1.0);
        assert_eq!(config.get_double("missingKey", 3.5), 3.5);
    }

    #[test]
    fn wrong_type_falls_back_to_default() {
        let mut config = Config::new();
        config.set_text("speed", "fast");
        assert_eq!(config.get_double("speed", 9.9), 9.9);
    }

    #[test]
    fn setters_fire_change_notification() {
        let mut config = Config::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        config.on_change(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        config.set_double("altitude", 300.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Setting the same value again is not a change.
        config.set_double("altitude", 300.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        config.set_double("altitude", 400.0);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut config = Config::new();
        config.set_double("altitude", 152.4);
        config.set_bool("enabled", true);
        config.set_text("pattern", "simulation-%03d.csv");
        config.set_list(
            "thresholds",
            vec![ConfigValue::Double(100.0), ConfigValue::Double(200.0)],
        );

        let json = config.to_json().unwrap();
        let restored = Config::from_json(&json).unwrap();
        assert_eq!(restored.get_double("altitude", 0.0), 152.4);
        assert!(restored.get_bool("enabled", false));
        assert_eq!(restored.get_text("pattern", ""), "simulation-%03d.csv");
        assert_eq!(restored.get_list("thresholds").len(), 2);
    }
}
