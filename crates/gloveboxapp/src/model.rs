//! # Domain Model
//!
//! The in-memory shapes used by business logic: [`Vehicle`] and [`Document`].
//!
//! These types deliberately carry no storage-specific fields. The folder a
//! vehicle lives in and the created/updated timestamps exist only on the
//! relational records (`db::records`) and the JSON transfer objects
//! (`transfer`). See `mapping` for the conversions between the three.
//!
//! ## Stored Type Strings
//!
//! Both enums round-trip through a stable string form (`as_str` /
//! `from_stored`). Parsing is total: an unrecognised string maps to the
//! `Other` variant. Sidecars written by a newer app version that introduced a
//! new vehicle or document kind still import, they just lose the finer
//! classification.
//!
//! ## Folder Names
//!
//! A vehicle's folder name is derived from `brand` and `model` by plain
//! concatenation ([`folder_name_for`]). Only characters that would change the
//! meaning of the path are replaced. Collisions between two vehicles are
//! resolved by the repository, which appends a short id suffix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VehicleType {
    #[default]
    Car,
    Motorcycle,
    Truck,
    Bicycle,
    Other,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Truck => "truck",
            VehicleType::Bicycle => "bicycle",
            VehicleType::Other => "other",
        }
    }

    /// Parses a stored type string. Unknown values fall back to `Other`.
    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "car" => VehicleType::Car,
            "motorcycle" => VehicleType::Motorcycle,
            "truck" => VehicleType::Truck,
            "bicycle" => VehicleType::Bicycle,
            _ => VehicleType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DocumentType {
    TechnicalInspection,
    Maintenance,
    Repair,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::TechnicalInspection => "technicalInspection",
            DocumentType::Maintenance => "maintenance",
            DocumentType::Repair => "repair",
            DocumentType::Other => "other",
        }
    }

    /// Parses a stored type string. Unknown values fall back to `Other`.
    pub fn from_stored(value: &str) -> Self {
        match value.trim() {
            "technicalInspection" | "technical_inspection" => DocumentType::TechnicalInspection,
            "maintenance" => DocumentType::Maintenance,
            "repair" => DocumentType::Repair,
            _ => DocumentType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    /// Absolute path, rebuilt from the vehicle folder at read time.
    pub file_path: PathBuf,
    pub name: String,
    pub date: DateTime<Utc>,
    pub mileage: String,
    pub document_type: DocumentType,
    pub amount: Option<f64>,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Document {
    /// File name component of `file_path`.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub vehicle_type: VehicleType,
    pub brand: String,
    pub model: String,
    /// Free-form ("150 000 km"), never parsed.
    pub mileage: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub plate: String,
    pub is_primary: bool,
    pub documents: Vec<Document>,
}

impl Vehicle {
    pub fn new(
        vehicle_type: VehicleType,
        brand: impl Into<String>,
        model: impl Into<String>,
        plate: impl Into<String>,
        registration_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vehicle_type,
            brand: brand.into(),
            model: model.into(),
            mileage: None,
            registration_date,
            plate: plate.into(),
            is_primary: false,
            documents: Vec::new(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model).trim().to_string()
    }

    pub fn folder_name(&self) -> String {
        folder_name_for(&self.brand, &self.model)
    }
}

/// Input for attaching a new document to a vehicle.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source: DocumentSource,
    pub name: String,
    pub date: DateTime<Utc>,
    pub mileage: String,
    pub document_type: DocumentType,
    pub amount: Option<f64>,
}

/// Where the bytes of a new document come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Raw bytes (camera capture, picker) with the desired file name.
    Bytes { data: Vec<u8>, file_name: String },
    /// An existing file on disk, copied into the vehicle folder.
    File(PathBuf),
}

impl DocumentSource {
    pub fn file_name(&self) -> String {
        match self {
            DocumentSource::Bytes { file_name, .. } => file_name.clone(),
            DocumentSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string()),
        }
    }
}

/// Derives the folder name for a vehicle: `<brand><model>`.
///
/// Path separators and characters reserved on common filesystems become `_`,
/// and a leading dot is replaced so the folder never turns hidden.
pub fn folder_name_for(brand: &str, model: &str) -> String {
    let raw = format!("{}{}", brand.trim(), model.trim());
    let mut name: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if name.starts_with('.') {
        name.replace_range(0..1, "_");
    }
    if name.is_empty() {
        name = "Vehicle".to_string();
    }
    name
}

/// Guesses a MIME type from a file name, defaulting to octet-stream.
pub fn mime_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
