//! # Persisted Settings
//!
//! Small key-value flags that live outside the relational schema: the legacy
//! migration completion flag, the last opened vehicle, and the storage root
//! reference.
//!
//! [`JsonSettingsStore`] keeps them in a single `settings.json` next to the
//! database and rewrites it atomically on every change.
//! [`MemorySettingsStore`] is the test double.

use crate::error::{GloveboxError, Result};
use crate::storage::atomic_write;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const LEGACY_MIGRATION_COMPLETED: &str = "legacy.migrationCompleted_v1";
pub const LAST_OPENED_VEHICLE_ID: &str = "app.lastOpenedVehicleId";
pub const STORAGE_ROOT_REFERENCE: &str = "storage.rootReference";

pub trait SettingsStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    fn get_string(&self, key: &str) -> Result<Option<String>>;

    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

pub struct JsonSettingsStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file.
    guard: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(GloveboxError::Settings(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.load()?;
        f(&mut map);
        let content = serde_json::to_vec_pretty(&Value::Object(map))?;
        atomic_write(&self.path, &content)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), Value::Bool(value));
        })
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), Value::String(value.to_string()));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

/// In-memory settings for testing.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
    simulate_write_error: Mutex<bool>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self
            .simulate_write_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = simulate;
    }

    fn check_writable(&self) -> Result<()> {
        if *self
            .simulate_write_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(GloveboxError::Settings("Simulated write error".to_string()));
        }
        Ok(())
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.values().get(key).and_then(|v| v.as_bool()))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.check_writable()?;
        self.values().insert(key.to_string(), Value::Bool(value));
        Ok(())
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values()
            .get(key)
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.values()
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.values().remove(key);
        Ok(())
    }
}
