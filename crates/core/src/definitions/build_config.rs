use crate::kind::{BuildConfig, KindOptions};
use serde_json::Value;
use std::collections::BTreeMap;

/// Explicit build-config overrides layered on top of a definition's kind options.
///
/// Each key either sets a value (`Some`) or masks the inherited key (`None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildConfigOverrides(BTreeMap<String, Option<Value>>);

impl BuildConfigOverrides {
    /// Sets `key`, replacing any earlier override.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), Some(value.into()));
    }

    /// Masks `key` so it is absent from the resolved config.
    pub fn unset(&mut self, key: impl Into<String>) {
        self.0.insert(key.into(), None);
    }

    /// Drops the override for `key`, exposing the inherited value again.
    pub fn clear(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// The override for `key`: `None` if absent, `Some(None)` if masked.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&Value>> {
        self.0.get(key).map(Option::as_ref)
    }

    /// Whether no overrides are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolves `base` with these overrides applied.
    #[must_use]
    pub fn apply(&self, base: KindOptions) -> BuildConfig {
        let mut config = base;
        for (key, value) in &self.0 {
            match value {
                Some(value) => {
                    config.insert(key.clone(), value.clone());
                }
                None => {
                    config.remove(key);
                }
            }
        }
        config
    }
}
