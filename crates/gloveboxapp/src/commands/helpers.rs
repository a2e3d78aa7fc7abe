//! Resolving the vehicle and document references users type.
//!
//! A vehicle reference is, in order of precedence:
//!
//! - a 1-based position in the display order (`2`)
//! - a full id or a unique id prefix (`3f2a`)
//! - a case-insensitive display name (`toyota corolla`) or folder name
//!
//! A document reference is a 1-based position within the vehicle's document
//! list or a unique id prefix.

use crate::error::{GloveboxError, Result};
use crate::model::{Document, Vehicle};
use crate::repository::VehicleRepository;

pub fn resolve_vehicle(repo: &VehicleRepository, reference: &str) -> Result<Vehicle> {
    let id = resolve_vehicle_id(&repo.get_all_vehicles()?, reference)?;
    repo.get_vehicle(&id)
}

pub fn resolve_vehicle_id(vehicles: &[Vehicle], reference: &str) -> Result<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(GloveboxError::Api("empty vehicle reference".to_string()));
    }

    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= vehicles.len() {
            return Ok(vehicles[position - 1].id.clone());
        }
    }

    if let Some(v) = vehicles.iter().find(|v| v.id == reference) {
        return Ok(v.id.clone());
    }

    let by_prefix: Vec<&Vehicle> = vehicles
        .iter()
        .filter(|v| v.id.starts_with(reference))
        .collect();
    match by_prefix.len() {
        1 => return Ok(by_prefix[0].id.clone()),
        n if n > 1 => {
            return Err(GloveboxError::Api(format!(
                "'{}' matches {} vehicles, use a longer id",
                reference, n
            )))
        }
        _ => {}
    }

    let lowered = reference.to_lowercase();
    let by_name: Vec<&Vehicle> = vehicles
        .iter()
        .filter(|v| {
            v.display_name().to_lowercase() == lowered || v.folder_name().to_lowercase() == lowered
        })
        .collect();
    match by_name.len() {
        1 => Ok(by_name[0].id.clone()),
        0 => Err(GloveboxError::VehicleNotFound(reference.to_string())),
        n => Err(GloveboxError::Api(format!(
            "'{}' matches {} vehicles, use an index or id",
            reference, n
        ))),
    }
}

pub fn resolve_document<'a>(vehicle: &'a Vehicle, reference: &str) -> Result<&'a Document> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        if position >= 1 && position <= vehicle.documents.len() {
            return Ok(&vehicle.documents[position - 1]);
        }
    }

    let matches: Vec<&Document> = vehicle
        .documents
        .iter()
        .filter(|d| !reference.is_empty() && d.id.to_string().starts_with(reference))
        .collect();
    match matches.len() {
        1 => Ok(matches[0]),
        0 => Err(GloveboxError::Api(format!(
            "no document '{}' on {}",
            reference,
            vehicle.display_name()
        ))),
        n => Err(GloveboxError::Api(format!(
            "'{}' matches {} documents, use a longer id",
            reference, n
        ))),
    }
}
