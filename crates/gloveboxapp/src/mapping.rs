//! # Mapping Layer
//!
//! Pure conversions between the three shapes of the same data:
//!
//! | shape    | module         | carries                                   |
//! |----------|----------------|-------------------------------------------|
//! | domain   | `model`        | what business logic needs                 |
//! | record   | `db::records`  | + folder path, timestamps, relative paths |
//! | transfer | `transfer`     | + timestamps, camelCase JSON              |
//!
//! Shared fields survive every conversion unchanged. Type strings that no
//! variant matches become `Other`.
//!
//! Document paths are stored relative to their vehicle folder and rebuilt as
//! absolute paths when they reach the domain, so moving the storage root or
//! renaming a vehicle folder never invalidates a row.

use crate::db::{FileMetadataRecord, VehicleRecord};
use crate::model::{Document, DocumentType, Vehicle, VehicleType};
use crate::storage::is_contained_path;
use crate::transfer::{FileDto, VehicleDto};
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// Path of `path` relative to `folder`. Paths outside the folder keep only
/// their file name.
pub fn relative_to(folder: &Path, path: &Path) -> String {
    match path.strip_prefix(folder) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

// --- domain <-> record ---

/// `existing` is the row being replaced, if any: its `created_at` is kept.
pub fn vehicle_to_record(
    vehicle: &Vehicle,
    folder_path: &str,
    existing: Option<&VehicleRecord>,
    now: DateTime<Utc>,
) -> VehicleRecord {
    VehicleRecord {
        id: vehicle.id.clone(),
        vehicle_type: vehicle.vehicle_type.as_str().to_string(),
        brand: vehicle.brand.clone(),
        model: vehicle.model.clone(),
        mileage: vehicle.mileage.clone(),
        registration_date: vehicle.registration_date,
        plate: vehicle.plate.clone(),
        is_primary: vehicle.is_primary,
        folder_path: folder_path.to_string(),
        created_at: existing.map(|r| r.created_at).unwrap_or(now),
        updated_at: now,
    }
}

pub fn vehicle_from_record(record: &VehicleRecord, documents: Vec<Document>) -> Vehicle {
    Vehicle {
        id: record.id.clone(),
        vehicle_type: VehicleType::from_stored(&record.vehicle_type),
        brand: record.brand.clone(),
        model: record.model.clone(),
        mileage: record.mileage.clone(),
        registration_date: record.registration_date,
        plate: record.plate.clone(),
        is_primary: record.is_primary,
        documents,
    }
}

pub fn document_to_record(
    document: &Document,
    vehicle_id: &str,
    vehicle_folder: &Path,
) -> FileMetadataRecord {
    FileMetadataRecord {
        id: document.id.to_string(),
        vehicle_id: vehicle_id.to_string(),
        file_name: document.file_name(),
        relative_path: relative_to(vehicle_folder, &document.file_path),
        document_type: document.document_type.as_str().to_string(),
        document_name: document.name.clone(),
        date: document.date,
        mileage: document.mileage.clone(),
        amount: document.amount,
        file_size: document.file_size,
        mime_type: document.mime_type.clone(),
        created_at: document.created_at,
        modified_at: document.modified_at,
    }
}

/// `None` when the stored id is not a UUID or the relative path leaves
/// `vehicle_folder`.
pub fn document_from_record(record: &FileMetadataRecord, vehicle_folder: &Path) -> Option<Document> {
    let id = Uuid::parse_str(&record.id).ok()?;
    if !is_contained_path(&record.relative_path) {
        return None;
    }
    Some(Document {
        id,
        file_path: vehicle_folder.join(&record.relative_path),
        name: record.document_name.clone(),
        date: record.date,
        mileage: record.mileage.clone(),
        document_type: DocumentType::from_stored(&record.document_type),
        amount: record.amount,
        file_size: record.file_size,
        mime_type: record.mime_type.clone(),
        created_at: record.created_at,
        modified_at: record.modified_at,
    })
}

// --- record <-> transfer ---

pub fn vehicle_record_to_dto(record: &VehicleRecord) -> VehicleDto {
    VehicleDto {
        id: record.id.clone(),
        vehicle_type: record.vehicle_type.clone(),
        brand: record.brand.clone(),
        model: record.model.clone(),
        mileage: record.mileage.clone(),
        registration_date: record.registration_date,
        plate: record.plate.clone(),
        is_primary: record.is_primary,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// The folder path is not part of the sidecar; it is whatever folder the
/// sidecar was found in.
pub fn vehicle_record_from_dto(dto: &VehicleDto, folder_path: &str) -> VehicleRecord {
    VehicleRecord {
        id: dto.id.clone(),
        // Normalised so the relational store only ever holds known strings.
        vehicle_type: VehicleType::from_stored(&dto.vehicle_type).as_str().to_string(),
        brand: dto.brand.clone(),
        model: dto.model.clone(),
        mileage: dto.mileage.clone(),
        registration_date: dto.registration_date,
        plate: dto.plate.clone(),
        is_primary: dto.is_primary,
        folder_path: folder_path.to_string(),
        created_at: dto.created_at,
        updated_at: dto.updated_at,
    }
}

pub fn file_record_to_dto(record: &FileMetadataRecord) -> FileDto {
    FileDto {
        id: record.id.clone(),
        file_name: record.file_name.clone(),
        relative_path: record.relative_path.clone(),
        document_type: record.document_type.clone(),
        document_name: record.document_name.clone(),
        date: record.date,
        mileage: record.mileage.clone(),
        amount: record.amount,
        file_size: record.file_size,
        mime_type: record.mime_type.clone(),
        created_at: record.created_at,
        modified_at: record.modified_at,
    }
}

pub fn file_record_from_dto(dto: &FileDto, vehicle_id: &str) -> FileMetadataRecord {
    FileMetadataRecord {
        id: dto.id.clone(),
        vehicle_id: vehicle_id.to_string(),
        file_name: dto.file_name.clone(),
        relative_path: dto.relative_path.clone(),
        document_type: DocumentType::from_stored(&dto.document_type)
            .as_str()
            .to_string(),
        document_name: dto.document_name.clone(),
        date: dto.date,
        mileage: dto.mileage.clone(),
        amount: dto.amount,
        file_size: dto.file_size,
        mime_type: dto.mime_type.clone(),
        created_at: dto.created_at,
        modified_at: dto.modified_at,
    }
}

// --- domain <-> transfer ---

pub fn vehicle_to_dto(
    vehicle: &Vehicle,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> VehicleDto {
    VehicleDto {
        id: vehicle.id.clone(),
        vehicle_type: vehicle.vehicle_type.as_str().to_string(),
        brand: vehicle.brand.clone(),
        model: vehicle.model.clone(),
        mileage: vehicle.mileage.clone(),
        registration_date: vehicle.registration_date,
        plate: vehicle.plate.clone(),
        is_primary: vehicle.is_primary,
        created_at,
        updated_at,
    }
}

pub fn vehicle_from_dto(dto: &VehicleDto, documents: Vec<Document>) -> Vehicle {
    Vehicle {
        id: dto.id.clone(),
        vehicle_type: VehicleType::from_stored(&dto.vehicle_type),
        brand: dto.brand.clone(),
        model: dto.model.clone(),
        mileage: dto.mileage.clone(),
        registration_date: dto.registration_date,
        plate: dto.plate.clone(),
        is_primary: dto.is_primary,
        documents,
    }
}

pub fn document_to_dto(document: &Document, vehicle_folder: &Path) -> FileDto {
    file_record_to_dto(&document_to_record(document, "", vehicle_folder))
}

pub fn document_from_dto(dto: &FileDto, vehicle_folder: &Path) -> Option<Document> {
    document_from_record(&file_record_from_dto(dto, ""), vehicle_folder)
}
