use crate::commands::{CmdMessage, CmdResult};
use crate::db::{records, Database};
use crate::error::Result;
use crate::legacy::LegacyDataMigrator;
use crate::storage::{StorageManager, StorageState};

pub fn run(
    storage: &StorageManager,
    db: &Database,
    migrator: &LegacyDataMigrator,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();

    match storage.restore_persistent_folder() {
        StorageState::Configured(root) => {
            result.add_message(CmdMessage::info(format!("Storage: {}", root.display())));
            result.paths.push(root);
        }
        StorageState::NotConfigured => {
            result.add_message(CmdMessage::warning("Storage: not configured"));
        }
        StorageState::InvalidAccess => {
            result.add_message(CmdMessage::error("Storage: folder unreachable"));
        }
    }

    let (vehicles, documents, primary) = db.read(|conn| {
        Ok((
            records::count_vehicles(conn)?,
            records::count_files(conn)?,
            records::fetch_primary_vehicle(conn)?,
        ))
    })?;
    result.add_message(CmdMessage::info(format!(
        "Vehicles: {}, documents: {}",
        vehicles, documents
    )));
    if let Some(primary) = primary {
        result.add_message(CmdMessage::info(format!(
            "Primary: {} {}",
            primary.brand, primary.model
        )));
    }

    if migrator.is_completed() {
        result.add_message(CmdMessage::info("Previous version data: imported"));
    } else {
        result.add_message(CmdMessage::info("Previous version data: not imported yet"));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use crate::settings::LEGACY_MIGRATION_COMPLETED;
    use crate::test_utils::TestEnv;
    use std::sync::Arc;

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
    fn counts_and_primary() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Kia", "Rio", true);
        env.insert_file(&record, "a.pdf", crate::model::DocumentType::Repair);
        env.insert_vehicle("v2", "Audi", "A3", false);

        let result = run(&env.storage, &env.db, &migrator(&env)).unwrap();
        let text: Vec<&str> = result.messages.iter().map(|m| m.content.as_str()).collect();
        assert!(text.contains(&"Vehicles: 2, documents: 1"));
        assert!(text.contains(&"Primary: Kia Rio"));
        assert!(!result.has_problems());
    }

    #[test]
    fn unconfigured_storage_is_a_problem() {
        let env = TestEnv::unconfigured();
        let result = run(&env.storage, &env.db, &migrator(&env)).unwrap();
        assert!(result.has_problems());
    }

    #[test]
    fn reports_migration_flag() {
        let env = TestEnv::new();
        let settings: Arc<dyn SettingsStore> = env.settings.clone();
        settings.set_bool(LEGACY_MIGRATION_COMPLETED, true).unwrap();
        let result = run(&env.storage, &env.db, &migrator(&env)).unwrap();
        assert!(result
            .messages
            .iter()
            .any(|m| m.content == "Previous version data: imported"));
    }
}
