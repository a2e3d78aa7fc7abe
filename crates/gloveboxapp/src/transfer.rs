//! JSON transfer objects for the per-vehicle sidecar file.
//!
//! Field names are camelCase on the wire. Type fields stay plain strings so
//! a sidecar carrying a kind this version does not know still deserialises;
//! `mapping` decides what an unknown string means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SIDECAR_FILE_NAME: &str = ".vehicle_metadata.json";
pub const SIDECAR_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub id: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub mileage: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub plate: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub id: String,
    pub file_name: String,
    pub relative_path: String,
    pub document_type: String,
    pub document_name: String,
    pub date: DateTime<Utc>,
    pub mileage: String,
    pub amount: Option<f64>,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarInfo {
    pub version: String,
    pub last_synced_at: DateTime<Utc>,
    pub app_version: String,
}

impl SidecarInfo {
    /// Major component of `version` ("1.0" -> 1). `None` when unparseable.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.trim().parse().ok()
    }
}

/// The full content of `.vehicle_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarFile {
    pub vehicle: VehicleDto,
    #[serde(default)]
    pub files: Vec<FileDto>,
    pub metadata: SidecarInfo,
}
