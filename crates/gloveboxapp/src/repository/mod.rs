//! # Vehicle Repository
//!
//! The transaction boundary for every use case that changes data. Each
//! mutation follows the same order:
//!
//! 1. write the relational store (failures propagate, nothing else happens)
//! 2. rewrite the sidecar of every vehicle whose row changed
//! 3. mirror the change into the legacy flat file
//! 4. notify subscribed [`VehicleListener`]s
//!
//! Steps 2 and 3 are best-effort. Their failures are logged and the
//! operation still succeeds: the relational store is authoritative during
//! normal operation and the mirrors catch up on the next sync or rebuild.
//!
//! Mutations are serialised by a repository-level mutex so that folder
//! naming, renames and the single-primary rule never race. Reads go straight
//! to the database.
//!
//! ## Folders
//!
//! A vehicle's folder is named `<brand><model>` (see
//! [`folder_name_for`]). When another vehicle already owns that name, in the
//! database or on disk, the first eight characters of the id are appended. Updating brand or model
//! moves the folder to the new name; if the move fails the old folder is
//! kept and recorded.

use crate::db::{records, Database, VehicleRecord};
use crate::error::{GloveboxError, Result, StorageError};
use crate::legacy::LegacyStore;
use crate::mapping;
use crate::model::{folder_name_for, Vehicle};
use crate::settings::{SettingsStore, LAST_OPENED_VEHICLE_ID};
use crate::storage::StorageManager;
use crate::sync::MetadataSync;
use chrono::Utc;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

mod documents;
mod folders;
mod reconcile;

pub(crate) use folders::{available_folder_name, can_adopt_folder, folder_claimed_by};

pub use reconcile::ReconcileReport;

/// Receives the full, ordered vehicle list after every successful mutation.
pub trait VehicleListener: Send + Sync {
    fn vehicles_changed(&self, vehicles: &[Vehicle]);
}

pub struct VehicleRepository {
    db: Arc<Database>,
    storage: Arc<StorageManager>,
    sync: Arc<dyn MetadataSync>,
    settings: Arc<dyn SettingsStore>,
    legacy: Option<Arc<dyn LegacyStore>>,
    mutation: Mutex<()>,
    listeners: Mutex<Vec<Arc<dyn VehicleListener>>>,
}

impl VehicleRepository {
    /// `legacy` is the flat-file mirror; `None` turns mirroring off.
    pub fn new(
        db: Arc<Database>,
        storage: Arc<StorageManager>,
        sync: Arc<dyn MetadataSync>,
        settings: Arc<dyn SettingsStore>,
        legacy: Option<Arc<dyn LegacyStore>>,
    ) -> Self {
        Self {
            db,
            storage,
            sync,
            settings,
            legacy,
            mutation: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn VehicleListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    // --- vehicles ---

    /// Stores a new vehicle and creates its folder and sidecar.
    ///
    /// `vehicle.documents` is ignored; documents are attached with
    /// [`add_document`](Self::add_document).
    pub fn create_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle> {
        let _guard = self.lock();
        let vehicles_dir = self.require_storage()?;

        let now = Utc::now();
        let (record, cleared) = self.db.write(|tx| {
            let existing = records::fetch_vehicle(tx, &vehicle.id)?;
            let folder = match &existing {
                Some(existing) => existing.folder_path.clone(),
                None => {
                    available_folder_name(tx, &vehicles_dir, &vehicle.id, &vehicle.folder_name())?
                }
            };
            let record = mapping::vehicle_to_record(&vehicle, &folder, existing.as_ref(), now);
            records::upsert_vehicle(tx, &record)?;
            let cleared = if record.is_primary {
                records::clear_primary_except(tx, &record.id, now)?
            } else {
                0
            };
            Ok((record, cleared))
        })?;
        info!(vehicle = %record.id, folder = %record.folder_path, "vehicle created");

        if let Err(e) = self.storage.create_vehicle_folder(&record.folder_path) {
            warn!(vehicle = %record.id, error = %e, "could not create vehicle folder");
        }
        self.after_change(&record.id, cleared > 0);
        self.get_vehicle(&record.id)
    }

    /// Saves edited vehicle fields. When brand or model changed, the folder
    /// is moved to the new name. Documents are left untouched.
    pub fn update_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle> {
        let _guard = self.lock();
        let vehicles_dir = self.require_storage()?;

        let existing = self
            .db
            .read(|conn| records::fetch_vehicle(conn, &vehicle.id))?
            .ok_or_else(|| GloveboxError::VehicleNotFound(vehicle.id.clone()))?;

        let wanted = self
            .db
            .read(|conn| desired_folder(conn, &vehicles_dir, &vehicle, &existing))?;
        let folder = self.move_folder(&existing.folder_path, &wanted);

        let now = Utc::now();
        let written = self.db.write(|tx| {
            let record = mapping::vehicle_to_record(&vehicle, &folder, Some(&existing), now);
            records::upsert_vehicle(tx, &record)?;
            let cleared = if record.is_primary {
                records::clear_primary_except(tx, &record.id, now)?
            } else {
                0
            };
            Ok((record, cleared))
        });

        let (record, cleared) = match written {
            Ok(written) => written,
            Err(e) => {
                // The row still names the old folder.
                if folder != existing.folder_path {
                    self.move_folder(&folder, &existing.folder_path);
                }
                return Err(e);
            }
        };
        info!(vehicle = %record.id, folder = %record.folder_path, "vehicle updated");

        self.after_change(&record.id, cleared > 0);
        self.get_vehicle(&record.id)
    }

    /// Makes `id` the only primary vehicle and rewrites every sidecar.
    pub fn set_primary_vehicle(&self, id: &str) -> Result<()> {
        let _guard = self.lock();
        let found = self
            .db
            .write(|tx| records::set_primary_vehicle(tx, id, Utc::now()))?;
        if !found {
            return Err(GloveboxError::VehicleNotFound(id.to_string()));
        }
        info!(vehicle = id, "primary vehicle set");
        self.after_change(id, true);
        Ok(())
    }

    /// All vehicles, primary first, then by brand and model. Documents are
    /// not loaded; see [`get_vehicle`](Self::get_vehicle).
    pub fn get_all_vehicles(&self) -> Result<Vec<Vehicle>> {
        let rows = self.db.read(records::fetch_all_vehicles)?;
        Ok(rows
            .iter()
            .map(|r| mapping::vehicle_from_record(r, Vec::new()))
            .collect())
    }

    /// One vehicle with its documents, newest first.
    pub fn get_vehicle(&self, id: &str) -> Result<Vehicle> {
        let (record, files) = self.db.read(|conn| {
            let record = records::fetch_vehicle(conn, id)?
                .ok_or_else(|| GloveboxError::VehicleNotFound(id.to_string()))?;
            let files = records::fetch_files_for_vehicle(conn, id)?;
            Ok((record, files))
        })?;
        let folder = self.folder_of(&record)?;
        let documents = files
            .iter()
            .filter_map(|f| mapping::document_from_record(f, &folder))
            .collect();
        Ok(mapping::vehicle_from_record(&record, documents))
    }

    /// Deletes the vehicle, its documents and its folder.
    pub fn delete_vehicle(&self, id: &str) -> Result<()> {
        let _guard = self.lock();
        let record = self
            .db
            .read(|conn| records::fetch_vehicle(conn, id))?
            .ok_or_else(|| GloveboxError::VehicleNotFound(id.to_string()))?;

        self.db.write(|tx| records::delete_vehicle(tx, id))?;
        info!(vehicle = id, "vehicle deleted");

        if let Err(e) = self.storage.remove_vehicle_folder(&record.folder_path) {
            warn!(vehicle = id, folder = %record.folder_path, error = %e, "could not remove vehicle folder");
        }
        if let Some(legacy) = &self.legacy {
            if let Err(e) = legacy.delete_vehicle(id) {
                warn!(vehicle = id, error = %e, "legacy mirror delete failed");
            }
        }
        match self.settings.get_string(LAST_OPENED_VEHICLE_ID) {
            Ok(Some(last)) if last == id => {
                if let Err(e) = self.settings.remove(LAST_OPENED_VEHICLE_ID) {
                    warn!(error = %e, "could not clear last opened vehicle");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not read last opened vehicle"),
        }
        self.notify();
        Ok(())
    }

    pub fn vehicle_count(&self) -> Result<i64> {
        self.db.read(records::count_vehicles)
    }

    // --- launch ---

    /// The vehicle to show first: the last opened one if it still exists,
    /// else the primary, else the first in display order.
    pub fn launch_vehicle_id(&self) -> Result<Option<String>> {
        if let Some(last) = self.settings.get_string(LAST_OPENED_VEHICLE_ID)? {
            if self.db.read(|conn| records::fetch_vehicle(conn, &last))?.is_some() {
                return Ok(Some(last));
            }
            debug!(vehicle = %last, "last opened vehicle is gone");
        }
        if let Some(primary) = self.db.read(records::fetch_primary_vehicle)? {
            return Ok(Some(primary.id));
        }
        Ok(self
            .db
            .read(records::fetch_all_vehicles)?
            .into_iter()
            .next()
            .map(|r| r.id))
    }

    pub fn set_last_opened(&self, id: &str) -> Result<()> {
        if self.db.read(|conn| records::fetch_vehicle(conn, id))?.is_none() {
            return Err(GloveboxError::VehicleNotFound(id.to_string()));
        }
        self.settings.set_string(LAST_OPENED_VEHICLE_ID, id)
    }

    // --- internals ---

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_storage(&self) -> Result<PathBuf> {
        self.storage.vehicles_dir().map_err(|e| match e {
            StorageError::NotConfigured => GloveboxError::StorageNotConfigured,
            other => other.into(),
        })
    }

    fn folder_of(&self, record: &VehicleRecord) -> Result<PathBuf> {
        Ok(self.require_storage()?.join(&record.folder_path))
    }

    /// Moves `from` to `to`, returning the folder name actually in use.
    fn move_folder(&self, from: &str, to: &str) -> String {
        if from == to {
            return from.to_string();
        }
        match self.storage.rename_vehicle_folder(from, to) {
            Ok(_) => to.to_string(),
            Err(e) => {
                warn!(from, to, error = %e, "folder rename failed, keeping old folder");
                from.to_string()
            }
        }
    }

    /// Best-effort sidecar sync, legacy mirror and notification after a
    /// committed change to `vehicle_id`. `all_sidecars` rewrites every
    /// vehicle's sidecar (their primary flags changed).
    fn after_change(&self, vehicle_id: &str, all_sidecars: bool) {
        if all_sidecars {
            match self.db.read(records::fetch_all_vehicles) {
                Ok(rows) => {
                    for row in &rows {
                        self.sync_best_effort(&row.id);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not list vehicles for sidecar sync");
                    self.sync_best_effort(vehicle_id);
                }
            }
        } else {
            self.sync_best_effort(vehicle_id);
        }
        self.mirror_best_effort(vehicle_id);
        self.notify();
    }

    fn sync_best_effort(&self, vehicle_id: &str) {
        if let Err(e) = self.sync.sync_after_change(vehicle_id) {
            warn!(vehicle = vehicle_id, error = %e, "sidecar sync failed");
        }
    }

    fn mirror_best_effort(&self, vehicle_id: &str) {
        let Some(legacy) = &self.legacy else {
            return;
        };
        let result = self
            .get_vehicle(vehicle_id)
            .and_then(|vehicle| legacy.save_vehicle(&vehicle));
        if let Err(e) = result {
            warn!(vehicle = vehicle_id, error = %e, "legacy mirror write failed");
        }
    }

    fn notify(&self) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if listeners.is_empty() {
            return;
        }
        match self.get_all_vehicles() {
            Ok(vehicles) => {
                for listener in &listeners {
                    listener.vehicles_changed(&vehicles);
                }
            }
            Err(e) => warn!(error = %e, "could not load vehicles for listeners"),
        }
    }
}

/// The folder name `vehicle` should live in. Unchanged brand and model keep
/// the current folder, even if it carries a collision suffix.
fn desired_folder(
    conn: &Connection,
    vehicles_dir: &Path,
    vehicle: &Vehicle,
    existing: &VehicleRecord,
) -> Result<String> {
    let base = folder_name_for(&vehicle.brand, &vehicle.model);
    if base == folder_name_for(&existing.brand, &existing.model) {
        return Ok(existing.folder_path.clone());
    }
    available_folder_name(conn, vehicles_dir, &vehicle.id, &base)
}
