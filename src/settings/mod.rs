//! Hierarchical runtime settings.
//!
//! Keys are dot-delimited paths into a JSON object tree
//! (`connection.command_prefix`). Backends implement [`SettingsStore`];
//! [`MemorySettings`] keeps the tree in memory and [`JsonSettings`] writes it
//! through to a file after every update.

mod json;

pub use json::JsonSettings;

use crate::config::{SettingsBackend, SettingsConfig};
use crate::error::SettingsError;
use serde_json::{Map, Value};

pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<&Value>;

    /// Write `value` at `key`, creating intermediate objects.
    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError>;

    /// Write `value` only if `key` is absent. Returns whether it was written.
    fn set_initial(&mut self, key: &str, value: Value) -> Result<bool, SettingsError>;

    /// Re-read the backing storage, discarding unsaved changes.
    fn load(&mut self) -> Result<(), SettingsError>;

    /// Flush to the backing storage.
    fn save(&self) -> Result<(), SettingsError>;

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// String entries of an array setting; other entries are skipped.
    fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Open the backend selected by `[settings]`.
pub fn open(config: &SettingsConfig) -> Result<Box<dyn SettingsStore>, SettingsError> {
    match config.backend {
        SettingsBackend::Memory => Ok(Box::new(MemorySettings::new())),
        SettingsBackend::Json => Ok(Box::new(JsonSettings::open(&config.path)?)),
    }
}

/// Interpret user-supplied text as JSON, falling back to a plain string.
///
/// `5` becomes a number, `["#a"]` an array, `hello world` a string.
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// The object tree shared by the backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SettingsTree {
    root: Map<String, Value>,
}

impl SettingsTree {
    pub(crate) fn from_value(value: Value) -> Result<Self, SettingsError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    pub(crate) fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        parts.try_fold(self.root.get(first)?, |node, part| node.get(part))
    }

    pub(crate) fn set(&mut self, key: &str, value: Value, initial: bool) -> Result<bool, SettingsError> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SettingsError::EmptyKey);
        }
        let Some((leaf, branches)) = parts.split_last() else {
            return Err(SettingsError::EmptyKey);
        };

        let mut node = &mut self.root;
        for part in branches {
            let child = node.entry(part.to_string()).or_insert(Value::Null);
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => return Err(SettingsError::NotAnObject),
            };
        }

        if initial && node.contains_key(*leaf) {
            return Ok(false);
        }
        node.insert(leaf.to_string(), value);
        Ok(true)
    }
}

/// Settings that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySettings {
    tree: SettingsTree,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), SettingsError> {
        self.tree.set(key, value, false).map(|_| ())
    }

    fn set_initial(&mut self, key: &str, value: Value) -> Result<bool, SettingsError> {
        self.tree.set(key, value, true)
    }

    fn load(&mut self) -> Result<(), SettingsError> {
        Ok(())
    }

    fn save(&self) -> Result<(), SettingsError> {
        Ok(())
    }
}

/// A plugin's view of the store, with every key under `<plugin>.`.
pub struct PluginSettings<'a> {
    plugin: &'a str,
    store: &'a mut dyn SettingsStore,
}

impl<'a> PluginSettings<'a> {
    pub fn new(plugin: &'a str, store: &'a mut dyn SettingsStore) -> Self {
        Self { plugin, store }
    }

    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.plugin, key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.store.get(&self.key(key))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.store.get_str(&self.key(key))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SettingsError> {
        let key = self.key(key);
        self.store.set(&key, value.into())
    }

    pub fn set_initial(&mut self, key: &str, value: impl Into<Value>) -> Result<bool, SettingsError> {
        let key = self.key(key);
        self.store.set_initial(&key, value.into())
    }
}
