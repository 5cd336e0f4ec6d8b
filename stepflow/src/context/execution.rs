//! The mutable key/value context for one execution.

use crate::errors::StepflowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping from string keys to JSON values supplied by the caller.
///
/// Steps read from it and may publish new keys for later steps. The public
/// API offers no removal, so a step can never drop keys it does not own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    values: BTreeMap<String, serde_json::Value>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `StepflowError::Config` if `value` is not an object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, StepflowError> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(StepflowError::Config(format!(
                "execution context must be a JSON object, got {other}"
            ))),
        }
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Gets a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Publishes a value, returning the previous one if the key existed.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.values.insert(key.into(), value)
    }

    /// Returns the keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the subset of `required` absent from this context, in order.
    #[must_use]
    pub fn missing_keys<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .filter(|key| !self.values.contains_key(key.as_str()))
            .cloned()
            .collect()
    }

    /// Projects the given keys into a JSON object. Absent keys map to null.
    #[must_use]
    pub fn project<'a, I>(&self, keys: I) -> serde_json::Value
    where
        I: IntoIterator<Item = &'a String>,
    {
        let map: serde_json::Map<String, serde_json::Value> = keys
            .into_iter()
            .map(|key| {
                (
                    key.clone(),
                    self.values.get(key).cloned().unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }

    /// Copies every key that `branch` added or changed relative to `base`.
    ///
    /// Used to fold the clone a parallel step ran against back into the
    /// execution's context.
    pub(crate) fn merge_changes(&mut self, base: &Self, branch: Self) {
        for (key, value) in branch.values {
            if base.values.get(&key) != Some(&value) {
                self.values.insert(key, value);
            }
        }
    }

    /// Converts the context into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.values.clone().into_iter().collect())
    }
}

impl FromIterator<(String, serde_json::Value)> for ExecutionContext {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
