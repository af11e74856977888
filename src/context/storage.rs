// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Keyed data storage shared by every node of a run

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::errors::{PlanflowError, PlanflowResult};

/// Type-erased value held by the storage
pub type DataValue = Arc<dyn Any + Send + Sync>;

/// Thread-safe map from string key to a type-erased value.
///
/// Cloning the storage yields another handle to the same map. Use
/// [`DataStorage::snapshot`] for an independent copy.
#[derive(Clone, Default)]
pub struct DataStorage {
    data: Arc<DashMap<String, DataValue>>,
}

impl DataStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a key is present
    pub fn has_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Store a value, replacing any previous value under the key
    pub fn set_data<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Arc::new(value));
    }

    /// Store an already type-erased value
    pub fn set_any(&self, key: impl Into<String>, value: DataValue) {
        self.data.insert(key.into(), value);
    }

    /// Get a copy of the value stored under `key`
    pub fn get_data<T: Any + Clone>(&self, key: &str) -> PlanflowResult<T> {
        let value = self.get_any(key)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| PlanflowError::DataTypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Get the type-erased value stored under `key`
    pub fn get_any(&self, key: &str) -> PlanflowResult<DataValue> {
        self.data
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PlanflowError::DataKeyNotFound {
                key: key.to_string(),
            })
    }

    /// Check whether the value under `key` has type `T`
    pub fn holds<T: Any>(&self, key: &str) -> bool {
        self.data
            .get(key)
            .map(|entry| entry.value().is::<T>())
            .unwrap_or(false)
    }

    /// Remove a key, returning its value if it was present
    pub fn remove_data(&self, key: &str) -> Option<DataValue> {
        self.data.remove(key).map(|(_, value)| value)
    }

    /// Copy the value under `from` to `to`
    pub fn copy_data(&self, from: &str, to: &str) -> PlanflowResult<()> {
        let value = self.get_any(from)?;
        self.data.insert(to.to_string(), value);
        Ok(())
    }

    /// All keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Independent copy of the current entries.
    ///
    /// Values are shared immutably; later writes to either storage do not
    /// show up in the other.
    pub fn snapshot(&self) -> Self {
        let data: DashMap<String, DataValue> = self
            .data
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        Self {
            data: Arc::new(data),
        }
    }
}

impl fmt::Debug for DataStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStorage")
            .field("keys", &self.keys())
            .finish()
    }
}
