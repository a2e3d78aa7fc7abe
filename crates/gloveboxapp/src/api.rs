//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every glovebox operation, whatever the client.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the appropriate command function
//! - **Holds the wiring**: the components built by [`crate::init::initialize`]
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! It contains no business logic (that lives in `commands/*.rs` and the
//! repository) and performs no presentation: nothing here prints.
//!
//! ## References
//!
//! Vehicles and documents are addressed by the strings users type. The
//! grammar is documented in [`crate::commands::helpers`].
//!
//! ## Storage (Re)configuration
//!
//! Choosing a storage folder runs the launch sequence right away, so a
//! folder that already holds vehicles from another device is imported
//! without a restart.

use crate::commands::{self, documents::DocumentEdit, vehicles::VehicleEdit, vehicles::VehicleInput};
use crate::db::Database;
use crate::error::Result;
use crate::init::{self, LaunchReport};
use crate::legacy::LegacyDataMigrator;
use crate::model::NewDocument;
use crate::repository::{VehicleListener, VehicleRepository};
use crate::storage::StorageManager;
use crate::sync::MetadataSyncManager;
use std::path::Path;
use std::sync::Arc;

pub struct GloveboxApi {
    db: Arc<Database>,
    storage: Arc<StorageManager>,
    sync: Arc<MetadataSyncManager>,
    repository: Arc<VehicleRepository>,
    migrator: Arc<LegacyDataMigrator>,
}

impl GloveboxApi {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<StorageManager>,
        sync: Arc<MetadataSyncManager>,
        repository: Arc<VehicleRepository>,
        migrator: Arc<LegacyDataMigrator>,
    ) -> Self {
        Self {
            db,
            storage,
            sync,
            repository,
            migrator,
        }
    }

    pub fn repository(&self) -> &VehicleRepository {
        &self.repository
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn subscribe(&self, listener: Arc<dyn VehicleListener>) {
        self.repository.subscribe(listener);
    }

    // --- launch and storage ---

    pub fn launch(&self) -> LaunchReport {
        init::launch(&self.storage, &self.migrator, &self.sync)
    }

    /// The launch sequence, rendered as messages.
    pub fn startup(&self) -> commands::CmdResult {
        let mut result = commands::CmdResult::default();
        commands::maintenance::describe_launch(&self.launch(), &mut result);
        result
    }

    pub fn configure_storage(&self, path: &Path) -> Result<commands::CmdResult> {
        let mut result = commands::storage::configure(&self.storage, path)?;
        let report = self.launch();
        let mut launched = commands::CmdResult::default();
        commands::maintenance::describe_launch(&report, &mut launched);
        result.messages.extend(launched.messages);
        Ok(result)
    }

    pub fn show_storage(&self) -> Result<commands::CmdResult> {
        commands::storage::show(&self.storage)
    }

    pub fn clear_storage(&self) -> Result<commands::CmdResult> {
        commands::storage::clear(&self.storage)
    }

    pub fn status(&self) -> Result<commands::CmdResult> {
        commands::status::run(&self.storage, &self.db, &self.migrator)
    }

    // --- vehicles ---

    pub fn list_vehicles(&self) -> Result<commands::CmdResult> {
        commands::vehicles::list(&self.repository)
    }

    /// `None` shows the vehicle the app would open on launch.
    pub fn show_vehicle(&self, reference: Option<&str>) -> Result<commands::CmdResult> {
        match reference {
            Some(reference) => commands::vehicles::show(&self.repository, reference),
            None => commands::vehicles::show_default(&self.repository),
        }
    }

    pub fn add_vehicle(&self, input: VehicleInput) -> Result<commands::CmdResult> {
        commands::vehicles::add(&self.repository, input)
    }

    pub fn edit_vehicle(&self, reference: &str, edit: VehicleEdit) -> Result<commands::CmdResult> {
        commands::vehicles::edit(&self.repository, reference, edit)
    }

    pub fn remove_vehicle(&self, reference: &str) -> Result<commands::CmdResult> {
        commands::vehicles::remove(&self.repository, reference)
    }

    pub fn set_primary_vehicle(&self, reference: &str) -> Result<commands::CmdResult> {
        commands::vehicles::set_primary(&self.repository, reference)
    }

    // --- documents ---

    pub fn add_document(
        &self,
        vehicle_ref: &str,
        document: NewDocument,
    ) -> Result<commands::CmdResult> {
        commands::documents::add(&self.repository, vehicle_ref, document)
    }

    pub fn edit_document(
        &self,
        vehicle_ref: &str,
        document_ref: &str,
        edit: DocumentEdit,
    ) -> Result<commands::CmdResult> {
        commands::documents::edit(&self.repository, vehicle_ref, document_ref, edit)
    }

    pub fn remove_document(
        &self,
        vehicle_ref: &str,
        document_ref: &str,
    ) -> Result<commands::CmdResult> {
        commands::documents::remove(&self.repository, vehicle_ref, document_ref)
    }

    // --- maintenance ---

    pub fn rebuild(&self, force: bool) -> Result<commands::CmdResult> {
        commands::maintenance::rebuild(&self.sync, &self.storage, force)
    }

    pub fn migrate(&self) -> Result<commands::CmdResult> {
        commands::maintenance::migrate(&self.migrator)
    }

    pub fn doctor(&self) -> Result<commands::CmdResult> {
        commands::maintenance::doctor(&self.repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::LegacyStore;
    use crate::model::{DocumentSource, DocumentType, VehicleType};
    use crate::sync::MetadataSync;
    use crate::test_utils::TestEnv;
    use chrono::Utc;

    fn api(env: &TestEnv) -> GloveboxApi {
        let sync: Arc<dyn MetadataSync> = env.sync.clone();
        let legacy: Arc<dyn LegacyStore> = env.legacy.clone();
        let migrator = Arc::new(LegacyDataMigrator::new(
            env.settings.clone(),
            legacy,
            env.db.clone(),
            env.storage.clone(),
            sync,
        ));
        GloveboxApi::new(
            env.db.clone(),
            env.storage.clone(),
            env.sync.clone(),
            Arc::new(env.repository()),
            migrator,
        )
    }

    fn input() -> VehicleInput {
        VehicleInput {
            vehicle_type: VehicleType::Motorcycle,
            brand: "Honda".to_string(),
            model: "CB500".to_string(),
            plate: "MC-1".to_string(),
            registration_date: Utc::now(),
            mileage: Some("12 000 km".to_string()),
            primary: true,
        }
    }

    #[test]
    fn configure_storage_runs_launch() {
        let env = TestEnv::unconfigured();
        let api = api(&env);
        let result = api.configure_storage(env.dir.path()).unwrap();
        assert!(result.messages[0].content.starts_with("Storage folder set"));
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("No vehicles found")));
    }

    #[test]
    fn vehicle_and_document_flow() {
        let env = TestEnv::new();
        let api = api(&env);
        api.add_vehicle(input()).unwrap();
        api.add_document(
            "honda cb500",
            NewDocument {
                source: DocumentSource::Bytes {
                    data: b"pdf".to_vec(),
                    file_name: "insurance.pdf".to_string(),
                },
                name: "Insurance".to_string(),
                date: Utc::now(),
                mileage: "12000".to_string(),
                document_type: DocumentType::Other,
                amount: Some(310.5),
            },
        )
        .unwrap();

        let shown = api.show_vehicle(None).unwrap().listed_vehicles;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].documents.len(), 1);

        api.remove_document("1", "1").unwrap();
        api.remove_vehicle("1").unwrap();
        assert!(api.list_vehicles().unwrap().listed_vehicles.is_empty());
    }

    #[test]
    fn startup_without_storage_warns() {
        let env = TestEnv::unconfigured();
        assert!(api(&env).startup().has_problems());
    }
}
