//! Append-only registry of read-only diagnostic variables.
//!
//! # Design
//! - Entries are `(name, value handle)` pairs; iteration reads each handle
//!   when it is reached, so values updated after registration are reflected.
//! - The registry never removes or deduplicates entries.

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

/// Shared, updatable string value exposed through the registry.
#[derive(Debug, Clone, Default)]
pub struct RoValue(Arc<RwLock<String>>);

impl RoValue {
    /// Handle holding `value`.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Replace the current value.
    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> String {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
struct RoVar {
    name: &'static str,
    value: RoValue,
}

/// Ordered, append-only list of read-only variables.
#[derive(Debug, Default)]
pub struct RoVarRegistry {
    entries: RwLock<Vec<RoVar>>,
}

static GLOBAL: Lazy<Arc<RoVarRegistry>> = Lazy::new(|| Arc::new(RoVarRegistry::new()));

impl RoVarRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Append a variable.
    pub fn register(&self, name: &'static str, value: RoValue) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RoVar { name, value });
    }

    /// Registered variables in registration order, read lazily.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, String)> + use<> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        entries.into_iter().map(|var| (var.name, var.value.get()))
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON object of every variable.
    ///
    /// A JSON object cannot repeat a key, so a name registered twice shows
    /// the value of its last registration here. [`Self::iter`] still yields
    /// every entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .map(|(name, value)| (name.to_string(), Value::String(value)))
            .collect();
        Value::Object(map)
    }
}
