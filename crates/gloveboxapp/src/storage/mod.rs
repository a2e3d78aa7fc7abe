//! # Storage Manager
//!
//! Owns the reference to the user-chosen root folder and every physical
//! folder/file operation the rest of the crate performs.
//!
//! ## Layout
//!
//! ```text
//! <root>/                         # chosen by the user (cloud-synced folder)
//! └── <AppName>/
//!     ├── vehicles.json           # legacy flat file (mirror, read once on migration)
//!     └── Vehicles/
//!         └── <brand><model>/
//!             ├── .vehicle_metadata.json
//!             └── invoice.pdf ...
//! ```
//!
//! An older layout kept the vehicle folders directly in `<root>/Vehicles/`.
//! [`StorageManager::migrate_layout_if_needed`] merges that tree into the
//! current one.
//!
//! ## The Root Reference
//!
//! The root is persisted as a [`RootReference`] in the settings store and
//! resolved lazily. It can be revoked behind our back (folder deleted,
//! volume unmounted, permission withdrawn), so it is re-validated on every
//! access and never assumed to still exist. Directory listings are never
//! cached.
//!
//! ## Writes
//!
//! Every file write goes through [`atomic_write`]: a crash mid-write never
//! leaves a half-written file under the final name.

use crate::error::{StorageError, StorageResult};
use crate::settings::{SettingsStore, STORAGE_ROOT_REFERENCE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

mod files;
mod location;

pub use files::{
    atomic_write, is_contained_path, is_empty_dir, merge_dir, sanitize_file_name,
    unique_destination, ContentMigrationReport,
};
pub use location::RestrictedLocation;

pub const VEHICLES_DIR: &str = "Vehicles";
/// Folder name of the pre-app-folder layout, directly under the root.
pub const OLD_VEHICLES_DIR: &str = "Vehicles";

const WRITE_PROBE: &str = ".glovebox-write-probe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageState {
    NotConfigured,
    InvalidAccess,
    Configured(PathBuf),
}

/// The persisted handle to the user's root folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RootReference {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

pub struct StorageManager {
    settings: Arc<dyn SettingsStore>,
    app_folder_name: String,
    root: Mutex<Option<PathBuf>>,
}

impl StorageManager {
    pub fn new(settings: Arc<dyn SettingsStore>, app_folder_name: impl Into<String>) -> Self {
        Self {
            settings,
            app_folder_name: app_folder_name.into(),
            root: Mutex::new(None),
        }
    }

    pub fn app_folder_name(&self) -> &str {
        &self.app_folder_name
    }

    /// Resolves the previously saved root. Never fails: an unusable
    /// reference is reported as `InvalidAccess`.
    pub fn restore_persistent_folder(&self) -> StorageState {
        let reference = match self.load_reference() {
            Ok(Some(reference)) => reference,
            Ok(None) => return StorageState::NotConfigured,
            Err(e) => {
                warn!(error = %e, "stored root reference is unreadable");
                self.set_cached_root(None);
                return StorageState::InvalidAccess;
            }
        };

        match verify_access(&reference.path) {
            Ok(()) => {
                self.set_cached_root(Some(reference.path.clone()));
                StorageState::Configured(reference.path)
            }
            Err(e) => {
                warn!(path = %reference.path.display(), error = %e, "storage root is no longer accessible");
                self.set_cached_root(None);
                StorageState::InvalidAccess
            }
        }
    }

    /// Adopts `path` as the new root: checks access, creates the app
    /// sub-folders and persists the reference.
    ///
    /// Returns the app folder (`<path>/<AppName>`).
    pub fn save_storage_folder(&self, path: &Path) -> StorageResult<PathBuf> {
        self.try_save_storage_folder(path)
            .map_err(|e| classify_failure(path, e))
    }

    fn try_save_storage_folder(&self, path: &Path) -> StorageResult<PathBuf> {
        verify_access(path)?;

        let app_dir = path.join(&self.app_folder_name);
        let vehicles_dir = app_dir.join(VEHICLES_DIR);
        create_dir(&vehicles_dir)?;

        // Prove we can actually write before committing to the folder.
        let probe = app_dir.join(WRITE_PROBE);
        atomic_write(&probe, b"ok")?;
        let _ = fs::remove_file(&probe);

        let reference = RootReference {
            path: path.to_path_buf(),
            created_at: Utc::now(),
        };
        let encoded =
            serde_json::to_string(&reference).map_err(|e| StorageError::ReferenceCreation {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.settings
            .set_string(STORAGE_ROOT_REFERENCE, &encoded)
            .map_err(|e| StorageError::ReferenceCreation {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.set_cached_root(Some(path.to_path_buf()));
        info!(root = %path.display(), "storage folder configured");
        Ok(app_dir)
    }

    /// Forgets the saved root. Files on disk are left untouched.
    pub fn clear_storage_folder(&self) -> StorageResult<()> {
        self.settings
            .remove(STORAGE_ROOT_REFERENCE)
            .map_err(|e| StorageError::ReferenceCreation {
                path: PathBuf::new(),
                reason: e.to_string(),
            })?;
        self.set_cached_root(None);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.root().is_ok()
    }

    /// The user-chosen root, re-validated on every call.
    pub fn root(&self) -> StorageResult<PathBuf> {
        let cached = self
            .root
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let path = match cached {
            Some(path) => path,
            None => match self.load_reference() {
                Ok(Some(reference)) => reference.path,
                Ok(None) => return Err(StorageError::NotConfigured),
                Err(_) => {
                    return Err(StorageError::ReferenceResolution {
                        path: PathBuf::new(),
                    })
                }
            },
        };

        if let Err(e) = verify_access(&path) {
            self.set_cached_root(None);
            return Err(e);
        }
        self.set_cached_root(Some(path.clone()));
        Ok(path)
    }

    pub fn app_dir(&self) -> StorageResult<PathBuf> {
        let dir = self.root()?.join(&self.app_folder_name);
        create_dir(&dir)?;
        Ok(dir)
    }

    pub fn vehicles_dir(&self) -> StorageResult<PathBuf> {
        let dir = self.app_dir()?.join(VEHICLES_DIR);
        create_dir(&dir)?;
        Ok(dir)
    }

    pub fn vehicle_folder(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(self.vehicles_dir()?.join(name))
    }

    /// Path of a file kept directly in the app folder (the legacy flat file).
    pub fn app_file(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(self.app_dir()?.join(name))
    }

    /// Returns the vehicle folder, creating it when absent.
    pub fn create_vehicle_folder(&self, name: &str) -> StorageResult<PathBuf> {
        let folder = self.vehicle_folder(name)?;
        create_dir(&folder)?;
        Ok(folder)
    }

    /// Saves `data` into `destination` under `name`, or under `name (n)` when
    /// taken. Returns the final path.
    pub fn save_file(&self, data: &[u8], name: &str, destination: &Path) -> StorageResult<PathBuf> {
        create_dir(destination)?;
        let target = unique_destination(destination, &sanitize_file_name(name));
        atomic_write(&target, data)?;
        debug!(path = %target.display(), bytes = data.len(), "file saved");
        Ok(target)
    }

    /// Copies an existing file into `destination` with the same naming rules
    /// as [`save_file`](Self::save_file). The source is left in place.
    pub fn copy_file_into(
        &self,
        source: &Path,
        name: &str,
        destination: &Path,
    ) -> StorageResult<PathBuf> {
        create_dir(destination)?;
        let target = unique_destination(destination, &sanitize_file_name(name));
        let tmp = destination.join(format!(
            ".{}-{}.tmp",
            sanitize_file_name(name),
            uuid::Uuid::new_v4()
        ));
        fs::copy(source, &tmp)
            .and_then(|_| fs::rename(&tmp, &target))
            .map_err(|source_err| {
                let _ = fs::remove_file(&tmp);
                StorageError::FileSave {
                    path: target.clone(),
                    source: source_err,
                }
            })?;
        Ok(target)
    }

    /// Serialises `value` as pretty JSON to `folder/name`, overwriting.
    pub fn save_json_file<T: Serialize>(
        &self,
        value: &T,
        name: &str,
        folder: &Path,
    ) -> StorageResult<PathBuf> {
        let target = folder.join(name);
        let content = serde_json::to_vec_pretty(value).map_err(|e| StorageError::FileSave {
            path: target.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        atomic_write(&target, &content)?;
        Ok(target)
    }

    /// Moves a vehicle folder to its new name.
    ///
    /// - source present, target absent: plain move
    /// - both present: contents merged, nothing overwritten
    /// - source absent: target created
    pub fn rename_vehicle_folder(&self, old_name: &str, new_name: &str) -> StorageResult<PathBuf> {
        let vehicles = self.vehicles_dir()?;
        let from = vehicles.join(old_name);
        let to = vehicles.join(new_name);

        if old_name == new_name {
            create_dir(&to)?;
            return Ok(to);
        }

        if !from.exists() {
            create_dir(&to)?;
        } else if !to.exists() {
            files::move_entry(&from, &to).map_err(|source| StorageError::Migration {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
        } else {
            let mut report = ContentMigrationReport::default();
            merge_dir(&from, &to, &mut report)?;
            if !report.is_complete() {
                warn!(
                    from = %from.display(),
                    to = %to.display(),
                    skipped = report.skipped.len(),
                    "folder rename left conflicting files behind"
                );
            }
        }
        info!(from = old_name, to = new_name, "vehicle folder renamed");
        Ok(to)
    }

    /// Deletes a vehicle folder and everything in it.
    pub fn remove_vehicle_folder(&self, name: &str) -> StorageResult<()> {
        let folder = self.vehicle_folder(name)?;
        if folder.exists() {
            fs::remove_dir_all(&folder).map_err(|source| StorageError::Deletion {
                path: folder.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Merges the tree at `from` into `to`.
    pub fn migrate_content(&self, from: &Path, to: &Path) -> StorageResult<ContentMigrationReport> {
        let mut report = ContentMigrationReport::default();
        if !from.exists() {
            return Ok(report);
        }
        merge_dir(from, to, &mut report)?;
        Ok(report)
    }

    /// Removes the old-layout `<root>/Vehicles` folder once it is empty.
    ///
    /// Returns `false` (and keeps the folder) while it still holds files.
    pub fn delete_old_vehicles_directory(&self) -> StorageResult<bool> {
        let old = self.root()?.join(OLD_VEHICLES_DIR);
        if !old.exists() {
            return Ok(true);
        }
        if !is_empty_dir(&old) {
            warn!(path = %old.display(), "old vehicles folder still has content, keeping it");
            return Ok(false);
        }
        fs::remove_dir(&old).map_err(|source| StorageError::Deletion {
            path: old.clone(),
            source,
        })?;
        Ok(true)
    }

    /// One-time move from `<root>/Vehicles` to `<root>/<AppName>/Vehicles`.
    pub fn migrate_layout_if_needed(&self) -> StorageResult<Option<ContentMigrationReport>> {
        let root = self.root()?;
        let old = root.join(OLD_VEHICLES_DIR);
        let new = root.join(&self.app_folder_name).join(VEHICLES_DIR);
        if old == new || !old.is_dir() {
            return Ok(None);
        }

        info!(from = %old.display(), to = %new.display(), "migrating vehicles folder layout");
        let report = self.migrate_content(&old, &new)?;
        self.delete_old_vehicles_directory()?;
        Ok(Some(report))
    }

    fn load_reference(&self) -> StorageResult<Option<RootReference>> {
        let raw = self
            .settings
            .get_string(STORAGE_ROOT_REFERENCE)
            .map_err(|_| StorageError::ReferenceResolution {
                path: PathBuf::new(),
            })?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| StorageError::ReferenceResolution {
                    path: PathBuf::new(),
                }),
        }
    }

    fn set_cached_root(&self, root: Option<PathBuf>) {
        *self.root.lock().unwrap_or_else(PoisonError::into_inner) = root;
    }
}

fn create_dir(path: &Path) -> StorageResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| {
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::AccessDenied {
                path: path.to_path_buf(),
                source,
            }
        } else {
            StorageError::FolderCreation {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn verify_access(path: &Path) -> StorageResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(StorageError::ReferenceResolution {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(StorageError::AccessDenied {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(_) => {
            return Err(StorageError::ReferenceResolution {
                path: path.to_path_buf(),
            })
        }
    }
    fs::read_dir(path).map_err(|source| StorageError::AccessDenied {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn classify_failure(path: &Path, err: StorageError) -> StorageError {
    if matches!(err, StorageError::ReferenceCreation { .. }) {
        return err;
    }
    match RestrictedLocation::classify(path) {
        Some(kind) => StorageError::RestrictedLocation {
            path: path.to_path_buf(),
            kind,
        },
        None => err,
    }
}
