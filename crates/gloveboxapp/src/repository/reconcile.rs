//! Reconciliation between document rows and the files in vehicle folders.
//!
//! Two defects are possible:
//!
//! - **orphan row**: a `file_metadata` row whose file is gone (deleted in
//!   Finder, removed on another device)
//! - **orphan file**: a file in a vehicle folder that no row points at
//!   (copied in by hand, left over from a crash before the row was written)
//!
//! [`VehicleRepository::load_all_vehicles`] quietly drops orphan rows while
//! loading. [`VehicleRepository::doctor`] does a full pass: it also adopts
//! orphan files as `Other` documents, recreates missing folders, repairs the
//! primary flag and rewrites the sidecars.
//!
//! A vehicle whose folder does not exist at all keeps its rows in both
//! passes: the folder may simply not be synced down yet. `doctor` recreates
//! the empty folder but neither removes rows nor writes a sidecar into it,
//! so the real folder and sidecar win once they arrive.

use super::VehicleRepository;
use crate::db::{records, FileMetadataRecord, VehicleRecord};
use crate::error::Result;
use crate::mapping;
use crate::model::{mime_type_for, DocumentType, Vehicle};
use crate::transfer::SIDECAR_FILE_NAME;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub vehicles_checked: usize,
    pub orphan_rows_removed: usize,
    pub orphan_files_adopted: usize,
    pub folders_recreated: usize,
    pub extra_primaries_cleared: usize,
    pub sidecars_written: usize,
    pub sidecar_failures: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_rows_removed == 0
            && self.orphan_files_adopted == 0
            && self.folders_recreated == 0
            && self.extra_primaries_cleared == 0
            && self.sidecar_failures == 0
    }
}

impl VehicleRepository {
    /// Every vehicle with its documents, in display order. Rows whose file
    /// no longer exists are removed on the way.
    pub fn load_all_vehicles(&self) -> Result<Vec<Vehicle>> {
        let _guard = self.lock();
        let vehicles_dir = self.require_storage()?;
        let rows = self.db.read(records::fetch_all_vehicles)?;

        let mut vehicles = Vec::with_capacity(rows.len());
        for row in &rows {
            let folder = vehicles_dir.join(&row.folder_path);
            let mut files = self
                .db
                .read(|conn| records::fetch_files_for_vehicle(conn, &row.id))?;

            if folder.is_dir() {
                let removed = self.remove_orphan_rows(row, &folder, &files)?;
                if !removed.is_empty() {
                    files.retain(|f| !removed.contains(&f.id));
                    self.sync_best_effort(&row.id);
                }
            }

            let documents = files
                .iter()
                .filter_map(|f| mapping::document_from_record(f, &folder))
                .collect();
            vehicles.push(mapping::vehicle_from_record(row, documents));
        }
        Ok(vehicles)
    }

    /// Full reconciliation pass over every vehicle.
    ///
    /// A folder that had to be recreated is only created: its rows are kept
    /// and no sidecar is written, the same way `load_all_vehicles` treats an
    /// absent folder.
    pub fn doctor(&self) -> Result<ReconcileReport> {
        let _guard = self.lock();
        let vehicles_dir = self.require_storage()?;
        let cleared = self.db.write(|tx| records::normalize_primary(tx))?;
        let mut report = ReconcileReport {
            extra_primaries_cleared: cleared,
            ..ReconcileReport::default()
        };
        let rows = self.db.read(records::fetch_all_vehicles)?;

        for row in &rows {
            report.vehicles_checked += 1;
            let folder = vehicles_dir.join(&row.folder_path);

            // 1. Folder
            if !folder.is_dir() {
                self.storage.create_vehicle_folder(&row.folder_path)?;
                report.folders_recreated += 1;
                warn!(vehicle = %row.id, folder = %row.folder_path, "vehicle folder was missing, recreated; rows kept");
                continue;
            }

            // 2. Rows without files
            let files = self
                .db
                .read(|conn| records::fetch_files_for_vehicle(conn, &row.id))?;
            let removed = self.remove_orphan_rows(row, &folder, &files)?;
            report.orphan_rows_removed += removed.len();

            // 3. Files without rows
            let known: HashSet<&str> = files
                .iter()
                .filter(|f| !removed.contains(&f.id))
                .map(|f| f.relative_path.as_str())
                .collect();
            report.orphan_files_adopted += self.adopt_orphan_files(row, &folder, &known)?;

            // 4. Sidecar
            match self.sync.sync_after_change(&row.id) {
                Ok(()) => report.sidecars_written += 1,
                Err(e) => {
                    report.sidecar_failures += 1;
                    warn!(vehicle = %row.id, error = %e, "sidecar sync failed");
                }
            }
        }

        info!(?report, "reconciliation finished");
        if !report.is_clean() {
            self.notify();
        }
        Ok(report)
    }

    /// Deletes the rows among `files` whose file is missing from `folder`.
    /// Returns their ids.
    fn remove_orphan_rows(
        &self,
        vehicle: &VehicleRecord,
        folder: &Path,
        files: &[FileMetadataRecord],
    ) -> Result<Vec<String>> {
        let orphans: Vec<String> = files
            .iter()
            .filter(|f| !folder.join(&f.relative_path).is_file())
            .map(|f| f.id.clone())
            .collect();
        if orphans.is_empty() {
            return Ok(orphans);
        }

        self.db.write(|tx| {
            for id in &orphans {
                records::delete_file(tx, id)?;
            }
            Ok(())
        })?;
        for id in &orphans {
            warn!(vehicle = %vehicle.id, document = %id, "document file missing, row removed");
        }
        Ok(orphans)
    }

    /// Records every regular, non-hidden file in `folder` that is not in
    /// `known` as an `Other` document. Returns how many were adopted.
    fn adopt_orphan_files(
        &self,
        vehicle: &VehicleRecord,
        folder: &Path,
        known: &HashSet<&str>,
    ) -> Result<usize> {
        let mut adopted = Vec::new();
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || name.starts_with('.') || name == SIDECAR_FILE_NAME {
                continue;
            }
            if known.contains(name.as_str()) {
                continue;
            }

            let meta = entry.metadata()?;
            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            let display = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            adopted.push(FileMetadataRecord {
                id: Uuid::new_v4().to_string(),
                vehicle_id: vehicle.id.clone(),
                mime_type: mime_type_for(&name),
                file_name: name.clone(),
                relative_path: name,
                document_type: DocumentType::Other.as_str().to_string(),
                document_name: display,
                date: modified,
                mileage: String::new(),
                amount: None,
                file_size: meta.len() as i64,
                created_at: Utc::now(),
                modified_at: modified,
            });
        }

        if !adopted.is_empty() {
            self.db.write(|tx| {
                for file in &adopted {
                    records::upsert_file(tx, file)?;
                }
                Ok(())
            })?;
            for file in &adopted {
                info!(vehicle = %vehicle.id, file = %file.relative_path, "adopted untracked file");
            }
        }
        Ok(adopted.len())
    }
}
