use crate::commands::helpers::{resolve_document, resolve_vehicle};
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{GloveboxError, Result};
use crate::model::{DocumentType, NewDocument};
use crate::repository::VehicleRepository;
use chrono::{DateTime, Utc};

/// A partial edit of a document's metadata. The file itself never changes.
#[derive(Debug, Clone, Default)]
pub struct DocumentEdit {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub mileage: Option<String>,
    pub document_type: Option<DocumentType>,
    /// `Some(None)` clears the amount.
    pub amount: Option<Option<f64>>,
}

impl DocumentEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.date.is_none()
            && self.mileage.is_none()
            && self.document_type.is_none()
            && self.amount.is_none()
    }
}

pub fn add(repo: &VehicleRepository, vehicle_ref: &str, new: NewDocument) -> Result<CmdResult> {
    let vehicle = resolve_vehicle(repo, vehicle_ref)?;
    let document = repo.add_document(&vehicle.id, new)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Document added to {}: {} ({})",
        vehicle.display_name(),
        document.name,
        document.file_name()
    )));
    result.paths.push(document.file_path.clone());
    Ok(result.with_affected_documents(vec![document]))
}

pub fn edit(
    repo: &VehicleRepository,
    vehicle_ref: &str,
    document_ref: &str,
    edit: DocumentEdit,
) -> Result<CmdResult> {
    if edit.is_empty() {
        return Err(GloveboxError::Api("nothing to change".to_string()));
    }
    let vehicle = resolve_vehicle(repo, vehicle_ref)?;
    let mut document = resolve_document(&vehicle, document_ref)?.clone();

    if let Some(name) = edit.name {
        document.name = name;
    }
    if let Some(date) = edit.date {
        document.date = date;
    }
    if let Some(mileage) = edit.mileage {
        document.mileage = mileage;
    }
    if let Some(document_type) = edit.document_type {
        document.document_type = document_type;
    }
    if let Some(amount) = edit.amount {
        document.amount = amount;
    }

    let updated = repo.update_document(document)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Document updated: {}",
        updated.name
    )));
    Ok(result.with_affected_documents(vec![updated]))
}

pub fn remove(repo: &VehicleRepository, vehicle_ref: &str, document_ref: &str) -> Result<CmdResult> {
    let vehicle = resolve_vehicle(repo, vehicle_ref)?;
    let document = resolve_document(&vehicle, document_ref)?.clone();
    repo.delete_document(document.id)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Document removed from {}: {}",
        vehicle.display_name(),
        document.name
    )));
    Ok(result.with_affected_documents(vec![document]))
}
