//! Per-client configuration store
//!
//! A read-only bag of JSON values bound to a client when it is constructed.
//! Values are narrowed to the caller's type at the read site; an absent key
//! falls back to the caller's default, a mistyped one is an error naming the
//! key.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{Error, Result};

/// Key/value configuration bound to one client instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientConfig {
    values: BTreeMap<String, Value>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; any other JSON value is rejected
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::Config(format!(
                "client configuration must be a table, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Builder-style insert, for assembling configuration in code
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up `key`, returning `default` when it is absent
    ///
    /// An explicit `null` counts as absent.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Look up `key`, narrowing it to `T` if present
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| Error::config_value(key, format!("{} ({e})", json_type(value)))),
        }
    }

    /// Look up a key the client cannot work without
    pub fn require<T: DeserializeOwned>(&self, client: &str, key: &str) -> Result<T> {
        self.get(key)?
            .ok_or_else(|| Error::missing_config(client, key))
    }

    /// Deserialize the whole bag into a typed settings struct
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        let map: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Config(format!("invalid client settings: {e}")))
    }

    /// Raw stored value
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill in keys from `defaults` that this bag does not set
    pub(crate) fn merge_defaults(&mut self, defaults: &ClientConfig) {
        for (key, value) in &defaults.values {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ClientConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}
