//! One-shot import of the legacy flat file.
//!
//! Guarded by the `legacy.migrationCompleted_v1` setting, which is checked
//! before anything else and set once a pass has finished. Work is done per
//! item: each vehicle row is written on its own, then each of its documents
//! on its own, so one bad entry costs only itself.
//!
//! Rows that already exist are never touched. They were either written by
//! an interrupted earlier pass or restored from a sidecar, and a sidecar
//! carries better timestamps than the flat file. Only missing vehicles and
//! missing documents are added, which also makes a retried pass safe.

use super::{LegacyDocument, LegacyStore, LegacyVehicle};
use crate::db::{records, Database, FileMetadataRecord, VehicleRecord};
use crate::error::{GloveboxError, Result};
use crate::model::{folder_name_for, mime_type_for, DocumentType, VehicleType};
use crate::repository::{available_folder_name, can_adopt_folder, folder_claimed_by};
use crate::settings::{SettingsStore, LEGACY_MIGRATION_COMPLETED};
use crate::storage::StorageManager;
use crate::sync::MetadataSync;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFailure {
    pub vehicle_id: String,
    /// `None` when the vehicle itself could not be imported.
    pub document_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    AlreadyMigrated,
    NoLegacyData,
    /// Every legacy vehicle and document was already in the database, for
    /// example restored from the sidecars. The flag is set.
    AlreadyPresent,
    Success {
        vehicles: usize,
        documents: usize,
    },
    PartialSuccess {
        vehicles: usize,
        documents: usize,
        failures: Vec<MigrationFailure>,
    },
    /// Nothing was imported. The completion flag stays unset.
    Failure(String),
}

#[derive(Default)]
struct Tally {
    vehicles: usize,
    documents: usize,
    /// Items skipped because their row already existed.
    kept: usize,
    failures: Vec<MigrationFailure>,
}

impl Tally {
    fn fail(&mut self, vehicle_id: &str, document_id: Option<&str>, reason: impl ToString) {
        let reason = reason.to_string();
        warn!(vehicle = vehicle_id, document = ?document_id, %reason, "legacy item not migrated");
        self.failures.push(MigrationFailure {
            vehicle_id: vehicle_id.to_string(),
            document_id: document_id.map(str::to_string),
            reason,
        });
    }
}

pub struct LegacyDataMigrator {
    settings: Arc<dyn SettingsStore>,
    legacy: Arc<dyn LegacyStore>,
    db: Arc<Database>,
    storage: Arc<StorageManager>,
    sync: Arc<dyn MetadataSync>,
}

impl LegacyDataMigrator {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        legacy: Arc<dyn LegacyStore>,
        db: Arc<Database>,
        storage: Arc<StorageManager>,
        sync: Arc<dyn MetadataSync>,
    ) -> Self {
        Self {
            settings,
            legacy,
            db,
            storage,
            sync,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self.settings.get_bool(LEGACY_MIGRATION_COMPLETED) {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "could not read legacy migration flag");
                false
            }
        }
    }

    pub fn migrate(&self) -> MigrationOutcome {
        if self.is_completed() {
            return MigrationOutcome::AlreadyMigrated;
        }
        if !self.storage.is_configured() {
            return MigrationOutcome::Failure("storage folder is not configured".to_string());
        }

        if !self.legacy.exists() {
            info!("no legacy data file found");
            self.mark_completed();
            return MigrationOutcome::NoLegacyData;
        }

        let vehicles = match self.legacy.load_all() {
            Ok(vehicles) => vehicles,
            Err(e) => {
                warn!(error = %e, "legacy data file is unreadable, will retry next launch");
                return MigrationOutcome::Failure(e.to_string());
            }
        };
        if vehicles.is_empty() {
            self.mark_completed();
            return MigrationOutcome::NoLegacyData;
        }

        info!(vehicles = vehicles.len(), "migrating legacy data");
        let mut tally = Tally::default();
        for legacy in &vehicles {
            self.migrate_vehicle(legacy, &mut tally);
        }

        if tally.vehicles == 0 && tally.kept == 0 {
            let reason = tally
                .failures
                .first()
                .map(|f| f.reason.clone())
                .unwrap_or_else(|| "no vehicle could be imported".to_string());
            return MigrationOutcome::Failure(reason);
        }

        self.mark_completed();
        info!(
            vehicles = tally.vehicles,
            documents = tally.documents,
            kept = tally.kept,
            failures = tally.failures.len(),
            "legacy migration finished"
        );
        if tally.vehicles == 0 && tally.documents == 0 && tally.failures.is_empty() {
            MigrationOutcome::AlreadyPresent
        } else if tally.failures.is_empty() {
            MigrationOutcome::Success {
                vehicles: tally.vehicles,
                documents: tally.documents,
            }
        } else {
            MigrationOutcome::PartialSuccess {
                vehicles: tally.vehicles,
                documents: tally.documents,
                failures: tally.failures,
            }
        }
    }

    fn mark_completed(&self) {
        if let Err(e) = self.settings.set_bool(LEGACY_MIGRATION_COMPLETED, true) {
            warn!(error = %e, "could not persist legacy migration flag");
        }
    }

    fn migrate_vehicle(&self, legacy: &LegacyVehicle, tally: &mut Tally) {
        if legacy.id.trim().is_empty() {
            tally.fail("", None, "vehicle has no id");
            return;
        }

        let (record, created) = match self.write_vehicle(legacy) {
            Ok(written) => written,
            Err(e) => {
                tally.fail(&legacy.id, None, e);
                return;
            }
        };
        if created {
            tally.vehicles += 1;
        } else {
            tally.kept += 1;
        }

        let folder = match self.storage.create_vehicle_folder(&record.folder_path) {
            Ok(folder) => folder,
            Err(e) => {
                for doc in &legacy.documents {
                    tally.fail(&legacy.id, Some(doc.id.as_str()), &e);
                }
                return;
            }
        };

        let mut added = 0;
        for doc in &legacy.documents {
            match self.write_document(&record, doc, &folder) {
                Ok(true) => added += 1,
                Ok(false) => tally.kept += 1,
                Err(e) => tally.fail(&legacy.id, Some(doc.id.as_str()), e),
            }
        }
        tally.documents += added;

        if !created && added == 0 {
            return;
        }
        if let Err(e) = self.sync.sync_after_change(&record.id) {
            warn!(vehicle = %record.id, error = %e, "sidecar sync after legacy import failed");
        }
    }

    /// Returns the vehicle's row and whether it was written now. An existing
    /// row is returned as stored.
    fn write_vehicle(&self, legacy: &LegacyVehicle) -> Result<(VehicleRecord, bool)> {
        let vehicles_dir = self.storage.vehicles_dir()?;
        self.db.write(|tx| {
            if let Some(existing) = records::fetch_vehicle(tx, &legacy.id)? {
                debug!(vehicle = %legacy.id, "vehicle already in the database, kept");
                return Ok((existing, false));
            }
            let folder_path = legacy_folder(tx, &vehicles_dir, legacy)?;
            let now = Utc::now();
            let record = VehicleRecord {
                id: legacy.id.clone(),
                vehicle_type: VehicleType::from_stored(&legacy.vehicle_type)
                    .as_str()
                    .to_string(),
                brand: legacy.brand.clone(),
                model: legacy.model.clone(),
                mileage: legacy.mileage.clone(),
                registration_date: legacy.registration_date,
                plate: legacy.plate.clone(),
                is_primary: legacy.is_primary,
                folder_path,
                created_at: now,
                updated_at: now,
            };
            records::upsert_vehicle(tx, &record)?;
            if record.is_primary {
                records::clear_primary_except(tx, &record.id, now)?;
            }
            Ok((record, true))
        })
    }

    /// Returns `false` when the document's row already exists.
    fn write_document(
        &self,
        vehicle: &VehicleRecord,
        doc: &LegacyDocument,
        folder: &Path,
    ) -> Result<bool> {
        let id = legacy_document_id(&doc.id);
        if self
            .db
            .read(|conn| records::fetch_file(conn, &id.to_string()))?
            .is_some()
        {
            debug!(vehicle = %vehicle.id, document = %id, "document already in the database, kept");
            return Ok(false);
        }

        let path = self.import_file(doc, folder)?;
        let meta = fs::metadata(&path)?;
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = FileMetadataRecord {
            id: id.to_string(),
            vehicle_id: vehicle.id.clone(),
            mime_type: mime_type_for(&file_name),
            relative_path: file_name.clone(),
            file_name,
            document_type: DocumentType::from_stored(&doc.document_type)
                .as_str()
                .to_string(),
            document_name: doc.name.clone(),
            date: doc.date,
            mileage: doc.mileage.clone(),
            amount: doc.amount,
            file_size: meta.len() as i64,
            created_at: modified,
            modified_at: modified,
        };
        self.db.write(|tx| records::upsert_file(tx, &record))?;
        Ok(true)
    }

    /// Places the document's file in `folder` and returns its path there.
    fn import_file(&self, doc: &LegacyDocument, folder: &Path) -> Result<PathBuf> {
        let stored = doc.file_path();
        let name = doc
            .file_name()
            .ok_or_else(|| GloveboxError::Api(format!("document {} has no file name", doc.id)))?;
        let in_folder = folder.join(&name);

        if stored.parent() == Some(folder) && stored.is_file() {
            return Ok(stored);
        }
        if stored.is_file() {
            return Ok(self.storage.copy_file_into(&stored, &name, folder)?);
        }
        // Absolute URLs go stale when the container moves; the folder copy
        // is what is left.
        if in_folder.is_file() {
            return Ok(in_folder);
        }
        Err(GloveboxError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", stored.display()),
        )))
    }
}

/// The folder a new legacy vehicle should be recorded with. A folder whose
/// sidecar names the vehicle comes first, then the folder its documents
/// already sit in. Otherwise a free `<brand><model>` name.
fn legacy_folder(conn: &Connection, vehicles_dir: &Path, legacy: &LegacyVehicle) -> Result<String> {
    let mut hints = Vec::new();
    if let Some(name) = folder_claimed_by(vehicles_dir, &legacy.id)? {
        hints.push(name);
    }
    for doc in &legacy.documents {
        let path = doc.file_path();
        let Some(folder) = path.parent().filter(|p| p.parent() == Some(vehicles_dir)) else {
            continue;
        };
        if let Some(name) = folder.file_name() {
            hints.push(name.to_string_lossy().into_owned());
        }
    }
    for hint in &hints {
        let present = vehicles_dir.join(hint).is_dir();
        if present && can_adopt_folder(conn, vehicles_dir, &legacy.id, hint)? {
            return Ok(hint.clone());
        }
    }
    available_folder_name(
        conn,
        vehicles_dir,
        &legacy.id,
        &folder_name_for(&legacy.brand, &legacy.model),
    )
}

/// Legacy ids are usually UUIDs. Anything else is mapped to a stable v5 UUID
/// so re-running the import hits the same row.
fn legacy_document_id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()))
}
