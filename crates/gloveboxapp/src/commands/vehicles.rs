use crate::commands::helpers::resolve_vehicle;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{GloveboxError, Result};
use crate::model::{Vehicle, VehicleType};
use crate::repository::VehicleRepository;
use chrono::{DateTime, Utc};

/// Fields of a vehicle as entered by the user.
#[derive(Debug, Clone)]
pub struct VehicleInput {
    pub vehicle_type: VehicleType,
    pub brand: String,
    pub model: String,
    pub plate: String,
    pub registration_date: DateTime<Utc>,
    pub mileage: Option<String>,
    pub primary: bool,
}

/// A partial edit. `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct VehicleEdit {
    pub vehicle_type: Option<VehicleType>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub plate: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    /// `Some(None)` clears the mileage.
    pub mileage: Option<Option<String>>,
}

impl VehicleEdit {
    pub fn is_empty(&self) -> bool {
        self.vehicle_type.is_none()
            && self.brand.is_none()
            && self.model.is_none()
            && self.plate.is_none()
            && self.registration_date.is_none()
            && self.mileage.is_none()
    }

    fn apply(self, vehicle: &mut Vehicle) {
        if let Some(t) = self.vehicle_type {
            vehicle.vehicle_type = t;
        }
        if let Some(brand) = self.brand {
            vehicle.brand = brand;
        }
        if let Some(model) = self.model {
            vehicle.model = model;
        }
        if let Some(plate) = self.plate {
            vehicle.plate = plate;
        }
        if let Some(date) = self.registration_date {
            vehicle.registration_date = date;
        }
        if let Some(mileage) = self.mileage {
            vehicle.mileage = mileage;
        }
    }
}

/// Every vehicle with its documents, in display order.
pub fn list(repo: &VehicleRepository) -> Result<CmdResult> {
    let vehicles = repo.load_all_vehicles()?;
    let mut result = CmdResult::default();
    if vehicles.is_empty() {
        result.add_message(CmdMessage::info(
            "No vehicles yet. Add one with `glovebox add`.",
        ));
    }
    Ok(result.with_listed_vehicles(vehicles))
}

/// One vehicle with its documents. Remembered as the last opened vehicle.
pub fn show(repo: &VehicleRepository, reference: &str) -> Result<CmdResult> {
    let vehicle = resolve_vehicle(repo, reference)?;
    repo.set_last_opened(&vehicle.id)?;
    Ok(CmdResult::default().with_listed_vehicles(vec![vehicle]))
}

/// The vehicle shown when no reference is given: last opened, else primary,
/// else the first one.
pub fn show_default(repo: &VehicleRepository) -> Result<CmdResult> {
    match repo.launch_vehicle_id()? {
        Some(id) => {
            let vehicle = repo.get_vehicle(&id)?;
            Ok(CmdResult::default().with_listed_vehicles(vec![vehicle]))
        }
        None => {
            let mut result = CmdResult::default();
            result.add_message(CmdMessage::info(
                "No vehicles yet. Add one with `glovebox add`.",
            ));
            Ok(result)
        }
    }
}

pub fn add(repo: &VehicleRepository, input: VehicleInput) -> Result<CmdResult> {
    if input.brand.trim().is_empty() && input.model.trim().is_empty() {
        return Err(GloveboxError::Api(
            "a vehicle needs a brand or a model".to_string(),
        ));
    }
    let mut vehicle = Vehicle::new(
        input.vehicle_type,
        input.brand.trim(),
        input.model.trim(),
        input.plate.trim(),
        input.registration_date,
    );
    vehicle.mileage = input.mileage;
    vehicle.is_primary = input.primary;

    let created = repo.create_vehicle(vehicle)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Vehicle added: {}",
        created.display_name()
    )));
    Ok(result.with_affected_vehicles(vec![created]))
}

pub fn edit(repo: &VehicleRepository, reference: &str, edit: VehicleEdit) -> Result<CmdResult> {
    if edit.is_empty() {
        return Err(GloveboxError::Api("nothing to change".to_string()));
    }
    let mut vehicle = resolve_vehicle(repo, reference)?;
    let before = vehicle.display_name();
    edit.apply(&mut vehicle);
    if vehicle.brand.trim().is_empty() && vehicle.model.trim().is_empty() {
        return Err(GloveboxError::Api(
            "a vehicle needs a brand or a model".to_string(),
        ));
    }

    let updated = repo.update_vehicle(vehicle)?;
    let mut result = CmdResult::default();
    if before == updated.display_name() {
        result.add_message(CmdMessage::success(format!(
            "Vehicle updated: {}",
            updated.display_name()
        )));
    } else {
        result.add_message(CmdMessage::success(format!(
            "Vehicle updated: {} (was {})",
            updated.display_name(),
            before
        )));
    }
    Ok(result.with_affected_vehicles(vec![updated]))
}

pub fn remove(repo: &VehicleRepository, reference: &str) -> Result<CmdResult> {
    let vehicle = resolve_vehicle(repo, reference)?;
    repo.delete_vehicle(&vehicle.id)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Vehicle removed: {} ({} document(s))",
        vehicle.display_name(),
        vehicle.documents.len()
    )));
    Ok(result.with_affected_vehicles(vec![vehicle]))
}

pub fn set_primary(repo: &VehicleRepository, reference: &str) -> Result<CmdResult> {
    let vehicle = resolve_vehicle(repo, reference)?;
    let mut result = CmdResult::default();
    if vehicle.is_primary {
        result.add_message(CmdMessage::info(format!(
            "{} is already the primary vehicle",
            vehicle.display_name()
        )));
        return Ok(result.with_affected_vehicles(vec![vehicle]));
    }
    repo.set_primary_vehicle(&vehicle.id)?;
    let vehicle = repo.get_vehicle(&vehicle.id)?;
    result.add_message(CmdMessage::success(format!(
        "Primary vehicle: {}",
        vehicle.display_name()
    )));
    Ok(result.with_affected_vehicles(vec![vehicle]))
}
