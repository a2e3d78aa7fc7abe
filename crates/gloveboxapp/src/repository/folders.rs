//! Choosing the folder a vehicle lives in.
//!
//! A name is taken when another row records it, or when a folder on disk
//! claims it. Both checks ignore case: the storage root is usually on a
//! case-insensitive volume, and a synced `toyotaCorolla` and a local
//! `ToyotaCorolla` would land in the same place on such a device.
//!
//! On disk, a folder claims a name unless its sidecar names the vehicle
//! being placed, or it has the exact name, no sidecar and nothing in it.
//! A folder synced down from another device therefore stays with its owner
//! even before the local database knows that vehicle.
//!
//! The legacy import knows more: a folder holding a vehicle's documents is
//! that vehicle's folder even without a sidecar, so it may adopt one
//! ([`can_adopt_folder`]).

use crate::db::records;
use crate::error::Result;
use crate::storage::is_empty_dir;
use crate::sync::read_sidecar;
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// `base` when it is free for `vehicle_id`, else `base-<first 8 id chars>`,
/// else `base-<id>`.
pub(crate) fn available_folder_name(
    conn: &Connection,
    vehicles_dir: &Path,
    vehicle_id: &str,
    base: &str,
) -> Result<String> {
    let short: String = vehicle_id.chars().take(8).collect();
    for candidate in [base.to_string(), format!("{}-{}", base, short)] {
        if is_free(conn, vehicles_dir, vehicle_id, &candidate)? {
            return Ok(candidate);
        }
        debug!(vehicle = vehicle_id, folder = %candidate, "folder name taken");
    }
    Ok(format!("{}-{}", base, vehicle_id))
}

/// Like the check behind [`available_folder_name`], but a folder without a
/// sidecar is acceptable whatever it holds.
pub(crate) fn can_adopt_folder(
    conn: &Connection,
    vehicles_dir: &Path,
    vehicle_id: &str,
    name: &str,
) -> Result<bool> {
    check(conn, vehicles_dir, vehicle_id, name, true)
}

/// The folder directly under `vehicles_dir` whose sidecar names `vehicle_id`.
pub(crate) fn folder_claimed_by(vehicles_dir: &Path, vehicle_id: &str) -> Result<Option<String>> {
    let entries = match fs::read_dir(vehicles_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Ok(Some(sidecar)) = read_sidecar(&path) {
            if sidecar.vehicle.id == vehicle_id {
                return Ok(path.file_name().map(|n| n.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(None)
}

fn is_free(conn: &Connection, vehicles_dir: &Path, vehicle_id: &str, name: &str) -> Result<bool> {
    check(conn, vehicles_dir, vehicle_id, name, false)
}

fn check(
    conn: &Connection,
    vehicles_dir: &Path,
    vehicle_id: &str,
    name: &str,
    adopt_unclaimed: bool,
) -> Result<bool> {
    if let Some(owner) = records::fetch_vehicle_by_folder(conn, name)? {
        if owner.id != vehicle_id {
            return Ok(false);
        }
    }

    let entries = match fs::read_dir(vehicles_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let wanted = name.to_lowercase();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let on_disk = entry.file_name().to_string_lossy().into_owned();
        if !path.is_dir() || on_disk.to_lowercase() != wanted {
            continue;
        }
        match read_sidecar(&path) {
            Ok(Some(sidecar)) if sidecar.vehicle.id == vehicle_id => {}
            Ok(Some(sidecar)) => {
                debug!(folder = %on_disk, owner = %sidecar.vehicle.id, "folder belongs to another vehicle");
                return Ok(false);
            }
            Ok(None) if on_disk == name && (adopt_unclaimed || is_empty_dir(&path)) => {}
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!(folder = %on_disk, error = %e, "unreadable sidecar, treating folder as taken");
                return Ok(false);
            }
        }
    }
    Ok(true)
}
