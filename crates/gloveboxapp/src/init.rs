//! # Bootstrap
//!
//! [`initialize`] resolves where glovebox keeps its private state, loads
//! the configuration and wires every component by constructor injection.
//! It does not touch the user's storage folder; that happens in
//! [`GloveboxContext::launch`].
//!
//! ## Data Directory
//!
//! The database, `settings.json` and `glovebox.toml` live in one private
//! directory, resolved in this order:
//!
//! 1. The `data_override` argument (the CLI's `--data` flag).
//! 2. The `GLOVEBOX_DATA` environment variable (used by tests to isolate state).
//! 3. The OS data directory from the `directories` crate.
//!
//! The user's documents never live here. They live under the storage root
//! the user picks, which is usually inside a cloud-synced folder.
//!
//! ## Launch Sequence
//!
//! Every launch, and every time the storage folder is (re)chosen:
//!
//! 1. Restore the saved storage root. Stop here if there is none or it is
//!    unreachable.
//! 2. Move the pre-app-folder layout (`<root>/Vehicles`) into the app folder.
//! 3. Rebuild the database from the sidecars when it is empty.
//! 4. Run the legacy migrator (a no-op once its flag is set). It only adds
//!    vehicles and documents the database does not have yet.
//!
//! The rebuild runs first because the legacy file is mirrored into the
//! storage folder and so reaches every device. Its timestamps are coarser
//! than the sidecars', and rows restored from a sidecar are never replaced.
//!
//! Each step is independent: a failing step is recorded in the
//! [`LaunchReport`] and the next one still runs.

use crate::api::GloveboxApi;
use crate::config::GloveboxConfig;
use crate::db::Database;
use crate::error::{GloveboxError, Result};
use crate::legacy::{LegacyDataMigrator, LegacyJsonStore, LegacyStore, MigrationOutcome};
use crate::repository::VehicleRepository;
use crate::settings::{JsonSettingsStore, SettingsStore};
use crate::storage::{ContentMigrationReport, StorageManager, StorageState};
use crate::sync::{MetadataSync, MetadataSyncManager, RebuildOutcome};
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DATA_ENV_VAR: &str = "GLOVEBOX_DATA";
pub const SETTINGS_FILE: &str = "settings.json";

pub struct GloveboxContext {
    pub api: GloveboxApi,
    pub config: GloveboxConfig,
    pub data_dir: PathBuf,
}

impl GloveboxContext {
    pub fn launch(&self) -> LaunchReport {
        self.api.launch()
    }
}

/// What happened during [`launch`].
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchReport {
    pub storage: StorageState,
    /// `Some` when the old layout was found and moved.
    pub layout: Option<ContentMigrationReport>,
    pub migration: Option<MigrationOutcome>,
    pub rebuild: Option<RebuildOutcome>,
    /// Steps that failed, in order.
    pub errors: Vec<String>,
}

impl LaunchReport {
    pub(crate) fn new(storage: StorageState) -> Self {
        Self {
            storage,
            layout: None,
            migration: None,
            rebuild: None,
            errors: Vec::new(),
        }
    }
}

/// Resolves the private data directory. See the module docs for the order.
pub fn data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "glovebox", "glovebox")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| GloveboxError::Settings("could not determine the data directory".to_string()))
}

/// Loads `glovebox.toml` from `data_dir`, falling back to defaults.
pub fn load_config(data_dir: &std::path::Path) -> GloveboxConfig {
    Clapfig::builder()
        .app_name("glovebox")
        .file_name("glovebox.toml")
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

pub fn initialize(data_override: Option<PathBuf>) -> Result<GloveboxContext> {
    let data_dir = data_dir(data_override)?;
    let config = load_config(&data_dir);
    debug!(data_dir = %data_dir.display(), ?config, "initializing");

    let db = Arc::new(Database::open(&data_dir.join(&config.database_file))?);
    let settings: Arc<dyn SettingsStore> =
        Arc::new(JsonSettingsStore::new(data_dir.join(SETTINGS_FILE)));
    let storage = Arc::new(StorageManager::new(
        settings.clone(),
        config.app_folder_name(),
    ));
    let sync = Arc::new(MetadataSyncManager::new(
        db.clone(),
        storage.clone(),
        env!("CARGO_PKG_VERSION"),
    ));
    let legacy: Arc<dyn LegacyStore> = Arc::new(LegacyJsonStore::new(
        storage.clone(),
        config.legacy_file_name.clone(),
    ));
    let mirror = config.mirror_legacy.then(|| legacy.clone());

    let dyn_sync: Arc<dyn MetadataSync> = sync.clone();
    let repository = Arc::new(VehicleRepository::new(
        db.clone(),
        storage.clone(),
        dyn_sync.clone(),
        settings.clone(),
        mirror,
    ));
    let migrator = Arc::new(LegacyDataMigrator::new(
        settings,
        legacy,
        db.clone(),
        storage.clone(),
        dyn_sync,
    ));

    let api = GloveboxApi::new(db, storage, sync, repository, migrator);
    Ok(GloveboxContext {
        api,
        config,
        data_dir,
    })
}

/// Runs the launch sequence described in the module docs.
pub fn launch(
    storage: &StorageManager,
    migrator: &LegacyDataMigrator,
    sync: &MetadataSyncManager,
) -> LaunchReport {
    let state = storage.restore_persistent_folder();
    let mut report = LaunchReport::new(state.clone());
    match state {
        StorageState::Configured(root) => {
            info!(root = %root.display(), "storage restored");
        }
        StorageState::NotConfigured => {
            debug!("no storage folder configured");
            return report;
        }
        StorageState::InvalidAccess => {
            warn!("storage folder unreachable, skipping launch tasks");
            return report;
        }
    }

    // 1. Layout
    match storage.migrate_layout_if_needed() {
        Ok(layout) => report.layout = layout,
        Err(e) => {
            warn!(error = %e, "layout migration failed");
            report.errors.push(format!("layout migration: {}", e));
        }
    }

    // 2. Rebuild
    match sync.rebuild_if_needed() {
        Ok(outcome) => report.rebuild = Some(outcome),
        Err(e) => {
            warn!(error = %e, "database rebuild failed");
            report.errors.push(format!("rebuild: {}", e));
        }
    }

    // 3. Legacy data
    report.migration = Some(migrator.migrate());

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::records;
    use crate::model::{DocumentSource, DocumentType, NewDocument, Vehicle, VehicleType};
    use crate::sync::read_sidecar;
    use crate::test_utils::TestEnv;
    use chrono::Utc;

    fn migrator(env: &TestEnv) -> LegacyDataMigrator {
        LegacyDataMigrator::new(
            env.settings.clone(),
            env.legacy.clone(),
            env.db.clone(),
            env.storage.clone(),
            env.sync.clone(),
        )
    }

    #[test]
    fn override_wins_over_everything() {
        let dir = PathBuf::from("/tmp/glovebox-explicit");
        assert_eq!(data_dir(Some(dir.clone())).unwrap(), dir);
    }

    #[test]
    fn launch_without_storage_does_nothing() {
        let env = TestEnv::unconfigured();
        let report = launch(&env.storage, &migrator(&env), &env.sync);
        assert_eq!(report.storage, StorageState::NotConfigured);
        assert!(report.migration.is_none());
        assert!(report.rebuild.is_none());
    }

    #[test]
    fn launch_on_empty_storage() {
        let env = TestEnv::new();
        let report = launch(&env.storage, &migrator(&env), &env.sync);
        assert!(matches!(report.storage, StorageState::Configured(_)));
        assert_eq!(report.migration, Some(MigrationOutcome::NoLegacyData));
        assert_eq!(report.rebuild, Some(RebuildOutcome::EmptyNoVehiclesFound));
        assert!(report.errors.is_empty());
    }

    #[test]
    fn launch_moves_old_layout_then_rebuilds() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Kia", "Rio", true);
        env.sync.sync_after_change("v1").unwrap();
        let app_vehicles = env.storage.vehicles_dir().unwrap();

        // Put the folder where the old layout kept it and forget the row.
        let old = env.dir.path().join("Vehicles");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::rename(app_vehicles.join(&record.folder_path), old.join(&record.folder_path))
            .unwrap();
        env.db.write(|tx| records::delete_vehicle(tx, "v1")).unwrap();

        let report = launch(&env.storage, &migrator(&env), &env.sync);
        assert_eq!(report.layout.map(|l| l.is_complete()), Some(true));
        assert_eq!(report.rebuild, Some(RebuildOutcome::Rebuilt(1)));
        assert!(!old.exists());
        assert_eq!(env.db.read(records::count_vehicles).unwrap(), 1);
    }

    #[test]
    fn launch_restores_sidecars_before_the_mirrored_legacy_file() {
        let env = TestEnv::new();
        let repo = env.repository();
        let vehicle = repo
            .create_vehicle(Vehicle::new(VehicleType::Car, "Kia", "Rio", "P", Utc::now()))
            .unwrap();
        repo.add_document(
            &vehicle.id,
            NewDocument {
                source: DocumentSource::Bytes {
                    data: b"pdf".to_vec(),
                    file_name: "ct.pdf".to_string(),
                },
                name: "Inspection".to_string(),
                date: Utc::now(),
                mileage: String::new(),
                document_type: DocumentType::TechnicalInspection,
                amount: None,
            },
        )
        .unwrap();
        let record = env
            .db
            .read(|c| records::fetch_vehicle(c, &vehicle.id))
            .unwrap()
            .unwrap();
        let folder = env.storage.vehicle_folder(&record.folder_path).unwrap();
        let before = read_sidecar(&folder).unwrap().unwrap();
        assert_eq!(env.legacy.load_all().unwrap()[0].documents.len(), 1);

        // A second device: same storage folder, empty database, flag unset.
        let device = TestEnv::new();
        device.storage.save_storage_folder(env.dir.path()).unwrap();
        let report = launch(&device.storage, &migrator(&device), &device.sync);

        assert_eq!(report.rebuild, Some(RebuildOutcome::Rebuilt(1)));
        assert_eq!(report.migration, Some(MigrationOutcome::AlreadyPresent));
        let restored = device
            .db
            .read(|c| records::fetch_vehicle(c, &record.id))
            .unwrap()
            .unwrap();
        assert_eq!(restored.created_at, record.created_at);
        let after = read_sidecar(&folder).unwrap().unwrap();
        assert_eq!(after.vehicle.created_at, before.vehicle.created_at);
        assert_eq!(after.files, before.files);
    }
}
