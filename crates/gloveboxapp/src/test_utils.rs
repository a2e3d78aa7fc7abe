use crate::db::{records, Database, FileMetadataRecord, VehicleRecord};
use crate::error::{GloveboxError, Result};
use crate::legacy::{LegacyJsonStore, LegacyStore};
use crate::model::{folder_name_for, mime_type_for, DocumentType, Vehicle};
use crate::repository::VehicleRepository;
use crate::settings::{MemorySettingsStore, SettingsStore};
use crate::storage::StorageManager;
use crate::sync::{MetadataSync, MetadataSyncManager};
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// A configured storage root in a temp dir, an in-memory database and
/// in-memory settings, wired the way `init` wires them.
pub struct TestEnv {
    pub dir: TempDir,
    pub settings: Arc<MemorySettingsStore>,
    pub db: Arc<Database>,
    pub storage: Arc<StorageManager>,
    pub sync: Arc<MetadataSyncManager>,
    pub legacy: Arc<LegacyJsonStore>,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let env = Self::unconfigured();
        env.storage
            .save_storage_folder(env.dir.path())
            .expect("failed to configure storage");
        env
    }

    /// Same wiring, but no storage folder has been chosen.
    pub fn unconfigured() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let settings = Arc::new(MemorySettingsStore::new());
        let db = Arc::new(Database::open_in_memory().expect("failed to open database"));
        let storage = Arc::new(StorageManager::new(settings.clone(), "Glovebox"));
        let sync = Arc::new(MetadataSyncManager::new(db.clone(), storage.clone(), "test"));
        let legacy = Arc::new(LegacyJsonStore::new(storage.clone(), "vehicles.json"));
        Self {
            dir,
            settings,
            db,
            storage,
            sync,
            legacy,
        }
    }

    pub fn repository(&self) -> VehicleRepository {
        self.repository_with(self.sync.clone())
    }

    pub fn repository_with_failing_sync(&self) -> VehicleRepository {
        self.repository_with(Arc::new(FailingSync))
    }

    fn repository_with(&self, sync: Arc<dyn MetadataSync>) -> VehicleRepository {
        let settings: Arc<dyn SettingsStore> = self.settings.clone();
        let legacy: Arc<dyn LegacyStore> = self.legacy.clone();
        VehicleRepository::new(
            self.db.clone(),
            self.storage.clone(),
            sync,
            settings,
            Some(legacy),
        )
    }

    /// Inserts a vehicle row directly, bypassing the repository.
    pub fn insert_vehicle(&self, id: &str, brand: &str, model: &str, primary: bool) -> VehicleRecord {
        let now = Utc::now();
        let record = VehicleRecord {
            id: id.to_string(),
            vehicle_type: "car".to_string(),
            brand: brand.to_string(),
            model: model.to_string(),
            mileage: Some("10 000 km".to_string()),
            registration_date: now,
            plate: "TE-570-ST".to_string(),
            is_primary: primary,
            folder_path: folder_name_for(brand, model),
            created_at: now,
            updated_at: now,
        };
        self.db
            .write(|tx| records::upsert_vehicle(tx, &record))
            .expect("failed to insert vehicle");
        record
    }

    /// Writes a small file into the vehicle's folder and records it.
    pub fn insert_file(
        &self,
        vehicle: &VehicleRecord,
        name: &str,
        document_type: DocumentType,
    ) -> FileMetadataRecord {
        let folder = self
            .storage
            .create_vehicle_folder(&vehicle.folder_path)
            .expect("failed to create folder");
        fs::write(folder.join(name), b"test file").expect("failed to write file");
        let now = Utc::now();
        let record = FileMetadataRecord {
            id: Uuid::new_v4().to_string(),
            vehicle_id: vehicle.id.clone(),
            file_name: name.to_string(),
            relative_path: name.to_string(),
            document_type: document_type.as_str().to_string(),
            document_name: name.to_string(),
            date: now,
            mileage: "10000".to_string(),
            amount: Some(42.0),
            file_size: 9,
            mime_type: mime_type_for(name),
            created_at: now,
            modified_at: now,
        };
        self.db
            .write(|tx| records::upsert_file(tx, &record))
            .expect("failed to insert file");
        record
    }
}

/// A sync layer whose every write fails.
pub struct FailingSync;

impl MetadataSync for FailingSync {
    fn sync_after_change(&self, _vehicle_id: &str) -> Result<()> {
        Err(GloveboxError::Api("sync disabled".to_string()))
    }

    fn scan_and_rebuild_database(&self, _root: &Path) -> Result<Vec<Vehicle>> {
        Err(GloveboxError::Api("sync disabled".to_string()))
    }

    fn has_valid_metadata(&self, _folder: &Path) -> bool {
        false
    }
}
