use crate::error::{StorageError, StorageResult};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Outcome of merging one directory tree into another.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContentMigrationReport {
    /// Files and folders moved into the destination.
    pub moved: usize,
    /// Source files left in place because the destination already had them.
    pub skipped: Vec<PathBuf>,
}

impl ContentMigrationReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Writes `bytes` to `path` so that the final name only ever holds a complete file.
///
/// The data goes to a hidden temp file in the same directory first and is then
/// renamed over the target.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent).map_err(|source| StorageError::FolderCreation {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{}-{}.tmp", file_name, Uuid::new_v4()));

    let write = || -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };

    write().map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        StorageError::FileSave {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Strips any directory components from a caller-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = base.trim().to_string();
    if base.is_empty() || base.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        base
    }
}

/// True when `relative` names something inside the folder it is joined to:
/// not empty, not absolute, and free of `..`.
pub fn is_contained_path(relative: &str) -> bool {
    let mut normal = 0;
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal > 0
}

/// Returns `folder/name`, or `folder/stem (n).ext` for the first free `n`.
pub fn unique_destination(folder: &Path, name: &str) -> PathBuf {
    let candidate = folder.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = folder.join(format!("{} ({}){}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Moves a file or folder, falling back to copy-and-remove when a plain
/// rename is refused (different volumes, some cloud-backed folders).
pub fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if from.is_dir() {
                copy_dir(from, to)?;
                fs::remove_dir_all(from)
            } else {
                fs::copy(from, to).map_err(|_| rename_err)?;
                fs::remove_file(from)
            }
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if src.is_dir() {
            copy_dir(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}

/// Merges the contents of `from` into `to` without overwriting anything.
///
/// Entries missing at the destination are moved. Sub-folders present on both
/// sides are merged recursively. Files present on both sides stay where they
/// are and are listed in the report. Source folders left empty are removed.
pub fn merge_dir(from: &Path, to: &Path, report: &mut ContentMigrationReport) -> StorageResult<()> {
    let migration_err = |source: io::Error| StorageError::Migration {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::create_dir_all(to).map_err(|source| StorageError::FolderCreation {
        path: to.to_path_buf(),
        source,
    })?;

    let entries = fs::read_dir(from).map_err(migration_err)?;
    for entry in entries {
        let entry = entry.map_err(migration_err)?;
        let src = entry.path();
        let dst = to.join(entry.file_name());

        if !dst.exists() {
            move_entry(&src, &dst).map_err(|source| StorageError::Migration {
                from: src.clone(),
                to: dst.clone(),
                source,
            })?;
            report.moved += 1;
        } else if src.is_dir() && dst.is_dir() {
            merge_dir(&src, &dst, report)?;
        } else {
            warn!(source = %src.display(), target = %dst.display(), "target exists, leaving source in place");
            report.skipped.push(src);
        }
    }

    if is_empty_dir(from) {
        fs::remove_dir(from).map_err(|source| StorageError::Deletion {
            path: from.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
