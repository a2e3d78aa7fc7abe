//! # Metadata Sync
//!
//! Keeps each vehicle folder self-describing. After every change the vehicle
//! row and its document rows are written to `.vehicle_metadata.json` inside
//! the folder. Because the folders live in the user's cloud storage, the
//! sidecars are what travels to a new device: an empty local database is
//! rebuilt from them by [`MetadataSyncManager::scan_and_rebuild_database`].
//!
//! ## Failure Model
//!
//! Writes for one vehicle are serialised by a per-vehicle lock, so the file
//! always ends up reflecting the latest committed row. A failing sidecar
//! write is returned to the caller, which treats it as best-effort.
//!
//! The rebuild scan is tolerant: a folder without a sidecar, or with one
//! that does not parse, is skipped and the scan moves on. Only an unreadable
//! root aborts it. Rows are upserted by their stable ids, so running the scan
//! twice yields the same database.

use crate::db::{records, Database, FileMetadataRecord, VehicleRecord};
use crate::error::{GloveboxError, Result};
use crate::mapping;
use crate::model::Vehicle;
use crate::storage::{is_contained_path, StorageManager};
use crate::transfer::{SidecarFile, SidecarInfo, SIDECAR_FILE_NAME, SIDECAR_VERSION};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod locks;

pub use locks::KeyedLocks;

const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// What the repository and the legacy migrator need from the sync layer.
pub trait MetadataSync: Send + Sync {
    /// Rewrites the sidecar of `vehicle_id` from the database.
    fn sync_after_change(&self, vehicle_id: &str) -> Result<()>;

    /// Imports every valid sidecar found directly under `root`.
    fn scan_and_rebuild_database(&self, root: &Path) -> Result<Vec<Vehicle>>;

    fn has_valid_metadata(&self, folder: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The database already has vehicles.
    NotNeeded,
    /// The database was empty and this many vehicles were imported.
    Rebuilt(usize),
    /// The database is empty and no folder carries a usable sidecar.
    EmptyNoVehiclesFound,
}

pub struct MetadataSyncManager {
    db: Arc<Database>,
    storage: Arc<StorageManager>,
    locks: KeyedLocks,
    app_version: String,
}

impl MetadataSyncManager {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<StorageManager>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            db,
            storage,
            locks: KeyedLocks::new(),
            app_version: app_version.into(),
        }
    }

    /// True when the database is empty but at least one folder under the
    /// vehicles directory has a valid sidecar.
    pub fn needs_rebuild(&self) -> Result<bool> {
        if self.db.read(records::count_vehicles)? > 0 {
            return Ok(false);
        }
        let root = self.storage.vehicles_dir()?;
        Ok(vehicle_folders(&root)?
            .iter()
            .any(|folder| self.has_valid_metadata(folder)))
    }

    pub fn rebuild_if_needed(&self) -> Result<RebuildOutcome> {
        if self.db.read(records::count_vehicles)? > 0 {
            return Ok(RebuildOutcome::NotNeeded);
        }
        if !self.needs_rebuild()? {
            return Ok(RebuildOutcome::EmptyNoVehiclesFound);
        }
        let root = self.storage.vehicles_dir()?;
        let vehicles = self.scan_and_rebuild_database(&root)?;
        if vehicles.is_empty() {
            Ok(RebuildOutcome::EmptyNoVehiclesFound)
        } else {
            Ok(RebuildOutcome::Rebuilt(vehicles.len()))
        }
    }

    fn write_sidecar(&self, vehicle_id: &str) -> Result<PathBuf> {
        let (record, files) = self.db.read(|conn| {
            let record = records::fetch_vehicle(conn, vehicle_id)?
                .ok_or_else(|| GloveboxError::VehicleNotFound(vehicle_id.to_string()))?;
            let files = records::fetch_files_for_vehicle(conn, vehicle_id)?;
            Ok((record, files))
        })?;

        let folder = self.storage.create_vehicle_folder(&record.folder_path)?;
        let sidecar = export_vehicle_to_json(&record, &files, &self.app_version);
        let path = self
            .storage
            .save_json_file(&sidecar, SIDECAR_FILE_NAME, &folder)?;
        debug!(vehicle = vehicle_id, files = files.len(), "sidecar written");
        Ok(path)
    }

    fn import_folder(&self, folder: &Path) -> Result<Option<Vehicle>> {
        let folder_name = match folder.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return Ok(None),
        };
        let sidecar = match read_sidecar(folder) {
            Ok(Some(sidecar)) => sidecar,
            Ok(None) => {
                debug!(folder = %folder.display(), "no sidecar, skipping");
                return Ok(None);
            }
            Err(e) => {
                warn!(folder = %folder.display(), error = %e, "unreadable sidecar, skipping");
                return Ok(None);
            }
        };

        let (record, files) = import_vehicle_from_json(&sidecar, &folder_name);
        self.db.write(|tx| {
            records::upsert_vehicle(tx, &record)?;
            for file in &files {
                records::upsert_file(tx, file)?;
            }
            Ok(())
        })?;

        let documents = files
            .iter()
            .filter_map(|f| mapping::document_from_record(f, folder))
            .collect();
        Ok(Some(mapping::vehicle_from_record(&record, documents)))
    }
}

impl MetadataSync for MetadataSyncManager {
    fn sync_after_change(&self, vehicle_id: &str) -> Result<()> {
        self.locks
            .with_lock(vehicle_id, || self.write_sidecar(vehicle_id))
            .map(|_| ())
    }

    fn scan_and_rebuild_database(&self, root: &Path) -> Result<Vec<Vehicle>> {
        let folders = vehicle_folders(root)?;
        info!(root = %root.display(), folders = folders.len(), "rebuilding database from folders");

        let mut vehicles = Vec::new();
        for folder in &folders {
            match self.import_folder(folder) {
                Ok(Some(vehicle)) => vehicles.push(vehicle),
                Ok(None) => {}
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "failed to import folder, skipping")
                }
            }
        }

        let cleared = self.db.write(|tx| records::normalize_primary(tx))?;
        if cleared > 0 {
            warn!(cleared, "several primary vehicles found, kept the most recently updated");
            let primary = self.db.read(records::fetch_primary_vehicle)?;
            for vehicle in &mut vehicles {
                vehicle.is_primary = primary.as_ref().is_some_and(|p| p.id == vehicle.id);
            }
        }

        info!(imported = vehicles.len(), "database rebuild finished");
        Ok(vehicles)
    }

    fn has_valid_metadata(&self, folder: &Path) -> bool {
        matches!(read_sidecar(folder), Ok(Some(_)))
    }
}

/// Builds the sidecar content for one vehicle.
pub fn export_vehicle_to_json(
    record: &VehicleRecord,
    files: &[FileMetadataRecord],
    app_version: &str,
) -> SidecarFile {
    SidecarFile {
        vehicle: mapping::vehicle_record_to_dto(record),
        files: files.iter().map(mapping::file_record_to_dto).collect(),
        metadata: SidecarInfo {
            version: SIDECAR_VERSION.to_string(),
            last_synced_at: Utc::now(),
            app_version: app_version.to_string(),
        },
    }
}

/// Turns a parsed sidecar back into rows. `folder_name` is the folder the
/// sidecar was found in and becomes the vehicle's folder path.
///
/// File entries whose id is not a UUID, or whose relative path leaves the
/// folder, are dropped.
pub fn import_vehicle_from_json(
    sidecar: &SidecarFile,
    folder_name: &str,
) -> (VehicleRecord, Vec<FileMetadataRecord>) {
    match sidecar.metadata.major_version() {
        Some(major) if major <= SUPPORTED_MAJOR_VERSION => {}
        _ => warn!(
            vehicle = %sidecar.vehicle.id,
            version = %sidecar.metadata.version,
            "sidecar written by a newer format version, importing known fields"
        ),
    }

    let record = mapping::vehicle_record_from_dto(&sidecar.vehicle, folder_name);
    let files = sidecar
        .files
        .iter()
        .filter(|f| {
            if Uuid::parse_str(&f.id).is_err() {
                warn!(vehicle = %record.id, file = %f.id, "skipping file entry with invalid id");
                return false;
            }
            if !is_contained_path(&f.relative_path) {
                warn!(
                    vehicle = %record.id,
                    file = %f.id,
                    path = %f.relative_path,
                    "skipping file entry whose path leaves the vehicle folder"
                );
                return false;
            }
            true
        })
        .map(|f| mapping::file_record_from_dto(f, &record.id))
        .collect();
    (record, files)
}

/// Reads `folder/.vehicle_metadata.json`. `Ok(None)` when there is none.
pub fn read_sidecar(folder: &Path) -> Result<Option<SidecarFile>> {
    let path = folder.join(SIDECAR_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Immediate sub-folders of `root`, sorted by name.
fn vehicle_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        }
    }
    folders.sort();
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentType, VehicleType};
    use crate::test_utils::TestEnv;
    use chrono::Duration;

    #[test]
    fn sync_writes_sidecar_into_vehicle_folder() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Toyota", "Corolla", false);
        env.insert_file(&record, "invoice.pdf", DocumentType::Repair);

        env.sync.sync_after_change("v1").unwrap();

        let folder = env.storage.vehicle_folder(&record.folder_path).unwrap();
        let sidecar = read_sidecar(&folder).unwrap().unwrap();
        assert_eq!(sidecar.vehicle.id, "v1");
        assert_eq!(sidecar.files.len(), 1);
        assert_eq!(sidecar.files[0].document_type, "repair");
        assert_eq!(sidecar.metadata.version, SIDECAR_VERSION);
        assert!(env.sync.has_valid_metadata(&folder));
    }

    #[test]
    fn sync_unknown_vehicle_fails() {
        let env = TestEnv::new();
        assert!(matches!(
            env.sync.sync_after_change("ghost"),
            Err(GloveboxError::VehicleNotFound(_))
        ));
    }

    #[test]
    fn export_then_import_preserves_rows() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Peugeot", "208", true);
        let file = env.insert_file(&record, "ct.pdf", DocumentType::TechnicalInspection);

        let sidecar = export_vehicle_to_json(&record, std::slice::from_ref(&file), "1.2.3");
        let text = serde_json::to_string(&sidecar).unwrap();
        let parsed: SidecarFile = serde_json::from_str(&text).unwrap();
        let (back, files) = import_vehicle_from_json(&parsed, &record.folder_path);

        assert_eq!(back, record);
        assert_eq!(files, vec![file]);
        assert_eq!(parsed.metadata.app_version, "1.2.3");
    }

    #[test]
    fn newer_sidecar_version_still_imports() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Peugeot", "208", false);
        let mut sidecar = export_vehicle_to_json(&record, &[], "9.0.0");
        sidecar.metadata.version = "2.1".to_string();
        sidecar.vehicle.vehicle_type = "hovercraft".to_string();

        let (back, _) = import_vehicle_from_json(&sidecar, "Peugeot208");
        assert_eq!(back.id, "v1");
        assert_eq!(back.vehicle_type, VehicleType::Other.as_str());
    }

    #[test]
    fn import_drops_entries_escaping_the_folder() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Peugeot", "208", false);
        let good = env.insert_file(&record, "ct.pdf", DocumentType::TechnicalInspection);
        let mut bad = env.insert_file(&record, "x.pdf", DocumentType::Other);
        bad.relative_path = "../../../victim.txt".to_string();
        let mut absolute = env.insert_file(&record, "y.pdf", DocumentType::Other);
        absolute.relative_path = "/etc/passwd".to_string();

        let sidecar = export_vehicle_to_json(&record, &[good.clone(), bad, absolute], "test");
        let (_, files) = import_vehicle_from_json(&sidecar, &record.folder_path);
        assert_eq!(files, vec![good]);
    }

    #[test]
    fn rebuild_skips_folders_without_valid_sidecar() {
        let env = TestEnv::new();
        let root = env.storage.vehicles_dir().unwrap();
        fs::create_dir_all(root.join("Empty")).unwrap();
        fs::create_dir_all(root.join("Broken")).unwrap();
        fs::write(root.join("Broken").join(SIDECAR_FILE_NAME), "{ not json").unwrap();

        let record = env.insert_vehicle("v1", "Toyota", "Corolla", false);
        env.sync.sync_after_change("v1").unwrap();
        env.db.write(|tx| records::delete_vehicle(tx, "v1")).unwrap();

        let vehicles = env.sync.scan_and_rebuild_database(&root).unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].id, record.id);
        assert_eq!(env.db.read(records::count_vehicles).unwrap(), 1);
    }

    #[test]
    fn rebuild_takes_folder_path_from_actual_folder() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Toyota", "Corolla", false);
        env.sync.sync_after_change("v1").unwrap();
        env.db.write(|tx| records::delete_vehicle(tx, "v1")).unwrap();

        let root = env.storage.vehicles_dir().unwrap();
        fs::rename(root.join(&record.folder_path), root.join("Renamed")).unwrap();

        env.sync.scan_and_rebuild_database(&root).unwrap();
        let rebuilt = env
            .db
            .read(|c| records::fetch_vehicle(c, "v1"))
            .unwrap()
            .unwrap();
        assert_eq!(rebuilt.folder_path, "Renamed");
    }

    #[test]
    fn rebuild_normalises_several_primaries() {
        let env = TestEnv::new();
        let root = env.storage.vehicles_dir().unwrap();
        for (id, brand, age) in [("a", "Audi", 5), ("b", "BMW", 1)] {
            let mut record = env.insert_vehicle(id, brand, "X", false);
            record.is_primary = true;
            record.updated_at = Utc::now() - Duration::days(age);
            let sidecar = export_vehicle_to_json(&record, &[], "test");
            env.storage
                .save_json_file(&sidecar, SIDECAR_FILE_NAME, &root.join(&record.folder_path))
                .unwrap();
        }
        env.db.write(|tx| {
            records::delete_vehicle(tx, "a")?;
            records::delete_vehicle(tx, "b")
        })
        .unwrap();

        let vehicles = env.sync.scan_and_rebuild_database(&root).unwrap();
        let primaries: Vec<&str> = vehicles
            .iter()
            .filter(|v| v.is_primary)
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(primaries, vec!["b"]);
    }

    #[test]
    fn rebuild_of_unreadable_root_fails() {
        let env = TestEnv::new();
        let missing = env.dir.path().join("nope");
        assert!(env.sync.scan_and_rebuild_database(&missing).is_err());
    }

    #[test]
    fn rebuild_if_needed_outcomes() {
        let env = TestEnv::new();
        assert_eq!(
            env.sync.rebuild_if_needed().unwrap(),
            RebuildOutcome::EmptyNoVehiclesFound
        );

        env.insert_vehicle("v1", "Toyota", "Corolla", false);
        env.sync.sync_after_change("v1").unwrap();
        assert_eq!(env.sync.rebuild_if_needed().unwrap(), RebuildOutcome::NotNeeded);

        env.db.write(|tx| records::delete_vehicle(tx, "v1")).unwrap();
        assert!(env.sync.needs_rebuild().unwrap());
        assert_eq!(env.sync.rebuild_if_needed().unwrap(), RebuildOutcome::Rebuilt(1));
    }
}
