//! # Legacy Flat File
//!
//! Before the relational store, every vehicle and its documents lived in a
//! single `vehicles.json` array in the app folder. That file is read once by
//! the [`LegacyDataMigrator`] and, while `mirror_legacy` is on, kept up to
//! date so an older build pointed at the same folder still sees the data.
//!
//! The mirror is never authoritative. Its writes are best-effort and callers
//! only log their failures.
//!
//! Dates in the file are either RFC 3339 strings or numbers of seconds since
//! 2001-01-01T00:00:00Z (the encoding older builds used). Both are accepted;
//! the mirror writes RFC 3339.

use crate::error::Result;
use crate::model::Vehicle;
use crate::storage::{atomic_write, StorageManager};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

mod migrator;

pub use migrator::{LegacyDataMigrator, MigrationFailure, MigrationOutcome};

/// Unix timestamp of 2001-01-01T00:00:00Z.
const REFERENCE_DATE_UNIX: i64 = 978_307_200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyVehicle {
    pub id: String,
    #[serde(rename = "type", default)]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub mileage: Option<String>,
    #[serde(deserialize_with = "legacy_date")]
    pub registration_date: DateTime<Utc>,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub documents: Vec<LegacyDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub id: String,
    #[serde(rename = "fileURL")]
    pub file_url: String,
    pub name: String,
    #[serde(deserialize_with = "legacy_date")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub mileage: String,
    #[serde(rename = "type", default)]
    pub document_type: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl LegacyDocument {
    /// The file location named by `fileURL`: a `file://` URL or a bare path.
    pub fn file_path(&self) -> PathBuf {
        match Url::parse(&self.file_url) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .unwrap_or_else(|_| PathBuf::from(url.path())),
            _ => PathBuf::from(&self.file_url),
        }
    }

    pub fn file_name(&self) -> Option<String> {
        self.file_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

impl From<&Vehicle> for LegacyVehicle {
    fn from(vehicle: &Vehicle) -> Self {
        LegacyVehicle {
            id: vehicle.id.clone(),
            vehicle_type: vehicle.vehicle_type.as_str().to_string(),
            brand: vehicle.brand.clone(),
            model: vehicle.model.clone(),
            mileage: vehicle.mileage.clone(),
            registration_date: vehicle.registration_date,
            plate: vehicle.plate.clone(),
            is_primary: vehicle.is_primary,
            documents: vehicle
                .documents
                .iter()
                .map(|d| LegacyDocument {
                    id: d.id.to_string(),
                    file_url: file_url_for(&d.file_path),
                    name: d.name.clone(),
                    date: d.date,
                    mileage: d.mileage.clone(),
                    document_type: d.document_type.as_str().to_string(),
                    amount: d.amount,
                })
                .collect(),
        }
    }
}

fn file_url_for(path: &Path) -> String {
    Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string_lossy().into_owned())
}

fn legacy_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(DateTime<Utc>),
        Seconds(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(date) => Ok(date),
        Raw::Seconds(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            Utc.timestamp_opt(REFERENCE_DATE_UNIX + whole as i64, nanos)
                .single()
                .ok_or_else(|| serde::de::Error::custom(format!("date out of range: {}", secs)))
        }
    }
}

/// Access to the legacy flat file.
pub trait LegacyStore: Send + Sync {
    fn exists(&self) -> bool;

    fn load_all(&self) -> Result<Vec<LegacyVehicle>>;

    /// Inserts or replaces the entry with the vehicle's id.
    fn save_vehicle(&self, vehicle: &Vehicle) -> Result<()>;

    fn delete_vehicle(&self, id: &str) -> Result<()>;
}

/// `<root>/<AppName>/<file_name>`, resolved through the storage manager on
/// every call.
pub struct LegacyJsonStore {
    storage: Arc<StorageManager>,
    file_name: String,
    guard: Mutex<()>,
}

impl LegacyJsonStore {
    pub fn new(storage: Arc<StorageManager>, file_name: impl Into<String>) -> Self {
        Self {
            storage,
            file_name: file_name.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Result<PathBuf> {
        Ok(self.storage.app_file(&self.file_name)?)
    }

    fn read(&self) -> Result<Vec<LegacyVehicle>> {
        let path = self.path()?;
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn rewrite(&self, f: impl FnOnce(&mut Vec<LegacyVehicle>)) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        // An unparseable file is left alone rather than replaced.
        let mut vehicles = self.read()?;
        f(&mut vehicles);
        let content = serde_json::to_vec_pretty(&vehicles)?;
        atomic_write(&self.path()?, &content)?;
        Ok(())
    }
}

impl LegacyStore for LegacyJsonStore {
    fn exists(&self) -> bool {
        self.path().map(|p| p.is_file()).unwrap_or(false)
    }

    fn load_all(&self) -> Result<Vec<LegacyVehicle>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    fn save_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let entry = LegacyVehicle::from(vehicle);
        self.rewrite(|vehicles| {
            if entry.is_primary {
                for v in vehicles.iter_mut() {
                    v.is_primary = false;
                }
            }
            match vehicles.iter_mut().find(|v| v.id == entry.id) {
                Some(existing) => *existing = entry,
                None => vehicles.push(entry),
            }
        })
    }

    fn delete_vehicle(&self, id: &str) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        self.rewrite(|vehicles| vehicles.retain(|v| v.id != id))
    }
}
