use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::init::LaunchReport;
use crate::legacy::{LegacyDataMigrator, MigrationOutcome};
use crate::repository::{ReconcileReport, VehicleRepository};
use crate::storage::{ContentMigrationReport, StorageManager, StorageState};
use crate::sync::{MetadataSync, MetadataSyncManager, RebuildOutcome};

/// Rebuilds the database from the sidecars. Without `force` this only
/// happens when the database is empty; with it every sidecar is re-imported
/// over the existing rows.
pub fn rebuild(
    sync: &MetadataSyncManager,
    storage: &StorageManager,
    force: bool,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if force {
        let root = storage.vehicles_dir()?;
        let vehicles = sync.scan_and_rebuild_database(&root)?;
        result.add_message(CmdMessage::success(format!(
            "Re-imported {} vehicle(s) from their folders.",
            vehicles.len()
        )));
        return Ok(result.with_listed_vehicles(vehicles));
    }
    describe_rebuild(sync.rebuild_if_needed()?, &mut result);
    Ok(result)
}

pub fn migrate(migrator: &LegacyDataMigrator) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    describe_migration(&migrator.migrate(), &mut result);
    Ok(result)
}

pub fn doctor(repo: &VehicleRepository) -> Result<CmdResult> {
    let report = repo.doctor()?;
    let mut result = CmdResult::default();
    describe_reconcile(&report, &mut result);
    Ok(result)
}

/// Messages for everything the launch sequence did. Silent when there was
/// nothing to do.
pub fn describe_launch(report: &LaunchReport, result: &mut CmdResult) {
    match &report.storage {
        StorageState::Configured(root) => result.paths.push(root.clone()),
        StorageState::NotConfigured => {
            result.add_message(CmdMessage::warning(
                "No storage folder chosen. Run `glovebox storage set <folder>`.",
            ));
            return;
        }
        StorageState::InvalidAccess => {
            result.add_message(CmdMessage::error(
                "The storage folder can no longer be reached. Choose it again with `glovebox storage set <folder>`.",
            ));
            return;
        }
    }
    if let Some(layout) = &report.layout {
        describe_layout_migration(layout, result);
    }
    if let Some(rebuild) = report.rebuild {
        // The legacy import ran after the rebuild and may have found vehicles.
        let imported = matches!(
            report.migration,
            Some(MigrationOutcome::Success { .. } | MigrationOutcome::PartialSuccess { .. })
        );
        if !(imported && rebuild == RebuildOutcome::EmptyNoVehiclesFound) {
            describe_rebuild(rebuild, result);
        }
    }
    if let Some(migration) = &report.migration {
        describe_migration(migration, result);
    }
    for error in &report.errors {
        result.add_message(CmdMessage::error(format!("Launch step failed: {}", error)));
    }
}

pub fn describe_rebuild(outcome: RebuildOutcome, result: &mut CmdResult) {
    match outcome {
        RebuildOutcome::NotNeeded => {}
        RebuildOutcome::Rebuilt(count) => result.add_message(CmdMessage::success(format!(
            "Restored {} vehicle(s) from the storage folder.",
            count
        ))),
        RebuildOutcome::EmptyNoVehiclesFound => {
            result.add_message(CmdMessage::info("No vehicles found in the storage folder."))
        }
    }
}

pub fn describe_migration(outcome: &MigrationOutcome, result: &mut CmdResult) {
    match outcome {
        MigrationOutcome::AlreadyMigrated
        | MigrationOutcome::NoLegacyData
        | MigrationOutcome::AlreadyPresent => {}
        MigrationOutcome::Success {
            vehicles,
            documents,
        } => result.add_message(CmdMessage::success(format!(
            "Imported {} vehicle(s) and {} document(s) from the previous version.",
            vehicles, documents
        ))),
        MigrationOutcome::PartialSuccess {
            vehicles,
            documents,
            failures,
        } => {
            result.add_message(CmdMessage::warning(format!(
                "Imported {} vehicle(s) and {} document(s) from the previous version, {} item(s) could not be imported:",
                vehicles,
                documents,
                failures.len()
            )));
            for failure in failures {
                let item = match &failure.document_id {
                    Some(doc) => format!("document {} of vehicle {}", doc, failure.vehicle_id),
                    None => format!("vehicle {}", failure.vehicle_id),
                };
                result.add_message(CmdMessage::info(format!("  - {}: {}", item, failure.reason)));
            }
        }
        MigrationOutcome::Failure(reason) => result.add_message(CmdMessage::error(format!(
            "Could not import data from the previous version: {}. It will be retried next time.",
            reason
        ))),
    }
}

pub fn describe_layout_migration(report: &ContentMigrationReport, result: &mut CmdResult) {
    if report.is_complete() {
        result.add_message(CmdMessage::success(format!(
            "Moved {} item(s) into the app folder.",
            report.moved
        )));
    } else {
        result.add_message(CmdMessage::warning(format!(
            "Moved {} item(s) into the app folder, {} left in place because they already exist there:",
            report.moved,
            report.skipped.len()
        )));
        for path in &report.skipped {
            result.add_message(CmdMessage::info(format!("  - {}", path.display())));
        }
    }
}

pub fn describe_reconcile(report: &ReconcileReport, result: &mut CmdResult) {
    if report.is_clean() {
        result.add_message(CmdMessage::success(format!(
            "No inconsistencies found in {} vehicle(s).",
            report.vehicles_checked
        )));
        return;
    }

    result.add_message(CmdMessage::warning("Inconsistencies found and fixed:"));
    if report.extra_primaries_cleared > 0 {
        result.add_message(CmdMessage::info(format!(
            "  - Cleared the primary flag on {} extra vehicle(s).",
            report.extra_primaries_cleared
        )));
    }
    if report.folders_recreated > 0 {
        result.add_message(CmdMessage::info(format!(
            "  - Recreated {} missing vehicle folder(s).",
            report.folders_recreated
        )));
    }
    if report.orphan_rows_removed > 0 {
        result.add_message(CmdMessage::info(format!(
            "  - Removed {} document(s) whose file is gone.",
            report.orphan_rows_removed
        )));
    }
    if report.orphan_files_adopted > 0 {
        result.add_message(CmdMessage::success(format!(
            "  - Added {} untracked file(s) as documents.",
            report.orphan_files_adopted
        )));
    }
    if report.sidecar_failures > 0 {
        result.add_message(CmdMessage::error(format!(
            "  - {} metadata file(s) could not be written.",
            report.sidecar_failures
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use crate::db::records;
    use crate::legacy::MigrationFailure;
    use crate::test_utils::TestEnv;
    use std::fs;

    #[test]
    fn doctor_clean() {
        let env = TestEnv::new();
        let result = doctor(&env.repository()).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].content.contains("No inconsistencies"));
    }

    #[test]
    fn doctor_reports_adopted_files() {
        let env = TestEnv::new();
        let repo = env.repository();
        let record = env.insert_vehicle("v1", "Kia", "Rio", true);
        let folder = env.storage.create_vehicle_folder(&record.folder_path).unwrap();
        fs::write(folder.join("receipt.png"), b"png").unwrap();

        let result = doctor(&repo).unwrap();
        assert!(result.messages[0].content.contains("Inconsistencies found"));
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("Added 1 untracked")));
    }

    #[test]
    fn rebuild_not_needed_is_silent() {
        let env = TestEnv::new();
        env.insert_vehicle("v1", "Kia", "Rio", true);
        let result = rebuild(&env.sync, &env.storage, false).unwrap();
        assert!(result.messages.is_empty());
    }

    #[test]
    fn forced_rebuild_reimports() {
        let env = TestEnv::new();
        let record = env.insert_vehicle("v1", "Kia", "Rio", true);
        env.insert_file(&record, "a.pdf", crate::model::DocumentType::Repair);
        env.sync.sync_after_change("v1").unwrap();

        let result = rebuild(&env.sync, &env.storage, true).unwrap();
        assert_eq!(result.listed_vehicles.len(), 1);
        assert_eq!(env.db.read(records::count_files).unwrap(), 1);
    }

    #[test]
    fn partial_migration_lists_failures() {
        let mut result = CmdResult::default();
        describe_migration(
            &MigrationOutcome::PartialSuccess {
                vehicles: 3,
                documents: 4,
                failures: vec![MigrationFailure {
                    vehicle_id: "v2".to_string(),
                    document_id: Some("d9".to_string()),
                    reason: "file not found".to_string(),
                }],
            },
            &mut result,
        );
        assert_eq!(result.messages[0].level, MessageLevel::Warning);
        assert!(result.messages[1].content.contains("document d9 of vehicle v2"));
    }

    #[test]
    fn launch_with_legacy_import_omits_empty_rebuild() {
        let root = std::path::PathBuf::from("/tmp/glovebox-root");
        let mut report = LaunchReport::new(StorageState::Configured(root));
        report.rebuild = Some(RebuildOutcome::EmptyNoVehiclesFound);
        report.migration = Some(MigrationOutcome::Success {
            vehicles: 2,
            documents: 1,
        });

        let mut result = CmdResult::default();
        describe_launch(&report, &mut result);
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].content.contains("Imported 2 vehicle(s)"));
    }

    #[test]
    fn already_present_is_silent() {
        let mut result = CmdResult::default();
        describe_migration(&MigrationOutcome::AlreadyPresent, &mut result);
        assert!(result.messages.is_empty());
    }

    #[test]
    fn already_migrated_is_silent() {
        let mut result = CmdResult::default();
        describe_migration(&MigrationOutcome::AlreadyMigrated, &mut result);
        assert!(result.messages.is_empty());
    }
}
