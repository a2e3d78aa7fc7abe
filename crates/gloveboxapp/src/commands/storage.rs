use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::storage::{StorageManager, StorageState};
use std::path::Path;

/// Adopts `path` as the storage root.
pub fn configure(storage: &StorageManager, path: &Path) -> Result<CmdResult> {
    let app_dir = storage.save_storage_folder(path)?;
    let mut result = CmdResult::default().with_paths(vec![app_dir.clone()]);
    result.add_message(CmdMessage::success(format!(
        "Storage folder set: {}",
        app_dir.display()
    )));
    Ok(result)
}

pub fn show(storage: &StorageManager) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    match storage.restore_persistent_folder() {
        StorageState::Configured(root) => {
            let app_dir = storage.app_dir()?;
            result.add_message(CmdMessage::info(format!("Storage root: {}", root.display())));
            result.paths = vec![root, app_dir];
        }
        StorageState::NotConfigured => {
            result.add_message(CmdMessage::warning(
                "No storage folder chosen. Run `glovebox storage set <folder>`.",
            ));
        }
        StorageState::InvalidAccess => {
            result.add_message(CmdMessage::error(
                "The storage folder can no longer be reached. Choose it again with `glovebox storage set <folder>`.",
            ));
        }
    }
    Ok(result)
}

/// Forgets the storage root. Files on disk are left alone.
pub fn clear(storage: &StorageManager) -> Result<CmdResult> {
    storage.clear_storage_folder()?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(
        "Storage folder forgotten. Your files were not touched.",
    ));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use crate::error::{GloveboxError, StorageError};
    use crate::test_utils::TestEnv;

    #[test]
    fn configure_reports_app_folder() {
        let env = TestEnv::unconfigured();
        let result = configure(&env.storage, env.dir.path()).unwrap();
        assert_eq!(result.paths, vec![env.dir.path().join("Glovebox")]);
        assert_eq!(result.messages[0].level, MessageLevel::Success);
        assert!(env.storage.is_configured());
    }

    #[test]
    fn configure_missing_folder_fails() {
        let env = TestEnv::unconfigured();
        let err = configure(&env.storage, &env.dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, GloveboxError::Storage(_)));
    }

    #[test]
    fn show_unconfigured_warns() {
        let env = TestEnv::unconfigured();
        let result = show(&env.storage).unwrap();
        assert!(result.has_problems());
        assert!(result.paths.is_empty());
    }

    #[test]
    fn clear_then_show() {
        let env = TestEnv::new();
        assert!(!show(&env.storage).unwrap().has_problems());
        clear(&env.storage).unwrap();
        assert!(matches!(
            env.storage.root(),
            Err(StorageError::NotConfigured)
        ));
        assert!(show(&env.storage).unwrap().has_problems());
    }
}
