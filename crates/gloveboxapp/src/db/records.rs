//! Row types and queries for the `vehicle` and `file_metadata` tables.
//!
//! All functions take a `&Connection`; a `&Transaction` derefs to one, so the
//! same queries serve both [`Database::read`](super::Database::read) and
//! [`Database::write`](super::Database::write).
//!
//! Upserts use `INSERT .. ON CONFLICT(id) DO UPDATE`. `INSERT OR REPLACE`
//! would delete the existing vehicle row first and cascade-delete its
//! documents.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleRecord {
    pub id: String,
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub mileage: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub plate: String,
    pub is_primary: bool,
    /// Folder name relative to `<root>/<AppName>/Vehicles`.
    pub folder_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadataRecord {
    pub id: String,
    pub vehicle_id: String,
    pub file_name: String,
    /// Relative to the owning vehicle folder.
    pub relative_path: String,
    pub document_type: String,
    pub document_name: String,
    pub date: DateTime<Utc>,
    pub mileage: String,
    pub amount: Option<f64>,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

const VEHICLE_COLUMNS: &str = "id, type, brand, model, mileage, registration_date, plate, \
     is_primary, folder_path, created_at, updated_at";

const FILE_COLUMNS: &str = "id, vehicle_id, file_name, relative_path, document_type, \
     document_name, date, mileage, amount, file_size, mime_type, created_at, modified_at";

const VEHICLE_ORDER: &str =
    "ORDER BY is_primary DESC, brand COLLATE NOCASE, model COLLATE NOCASE, id";

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<VehicleRecord> {
    Ok(VehicleRecord {
        id: row.get(0)?,
        vehicle_type: row.get(1)?,
        brand: row.get(2)?,
        model: row.get(3)?,
        mileage: row.get(4)?,
        registration_date: row.get(5)?,
        plate: row.get(6)?,
        is_primary: row.get(7)?,
        folder_path: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileMetadataRecord> {
    Ok(FileMetadataRecord {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        file_name: row.get(2)?,
        relative_path: row.get(3)?,
        document_type: row.get(4)?,
        document_name: row.get(5)?,
        date: row.get(6)?,
        mileage: row.get(7)?,
        amount: row.get(8)?,
        file_size: row.get(9)?,
        mime_type: row.get(10)?,
        created_at: row.get(11)?,
        modified_at: row.get(12)?,
    })
}

// --- vehicle ---

pub fn upsert_vehicle(conn: &Connection, record: &VehicleRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO vehicle (id, type, brand, model, mileage, registration_date, plate,
                              is_primary, folder_path, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
           type = excluded.type,
           brand = excluded.brand,
           model = excluded.model,
           mileage = excluded.mileage,
           registration_date = excluded.registration_date,
           plate = excluded.plate,
           is_primary = excluded.is_primary,
           folder_path = excluded.folder_path,
           created_at = excluded.created_at,
           updated_at = excluded.updated_at",
        params![
            record.id,
            record.vehicle_type,
            record.brand,
            record.model,
            record.mileage,
            record.registration_date,
            record.plate,
            record.is_primary,
            record.folder_path,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

pub fn fetch_vehicle(conn: &Connection, id: &str) -> Result<Option<VehicleRecord>> {
    let sql = format!("SELECT {} FROM vehicle WHERE id = ?1", VEHICLE_COLUMNS);
    Ok(conn.query_row(&sql, [id], vehicle_from_row).optional()?)
}

/// All vehicles, primary first, then by brand and model (case-insensitive).
pub fn fetch_all_vehicles(conn: &Connection) -> Result<Vec<VehicleRecord>> {
    let sql = format!("SELECT {} FROM vehicle {}", VEHICLE_COLUMNS, VEHICLE_ORDER);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], vehicle_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_primary_vehicle(conn: &Connection) -> Result<Option<VehicleRecord>> {
    let sql = format!(
        "SELECT {} FROM vehicle WHERE is_primary = 1 ORDER BY updated_at DESC LIMIT 1",
        VEHICLE_COLUMNS
    );
    Ok(conn.query_row(&sql, [], vehicle_from_row).optional()?)
}

/// Folder names compare case-insensitively.
pub fn fetch_vehicle_by_folder(conn: &Connection, folder: &str) -> Result<Option<VehicleRecord>> {
    let sql = format!(
        "SELECT {} FROM vehicle WHERE folder_path = ?1 COLLATE NOCASE LIMIT 1",
        VEHICLE_COLUMNS
    );
    Ok(conn.query_row(&sql, [folder], vehicle_from_row).optional()?)
}

/// Returns `true` when a row was deleted. Documents go with it (cascade).
pub fn delete_vehicle(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM vehicle WHERE id = ?1", [id])? > 0)
}

pub fn count_vehicles(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM vehicle", [], |row| row.get(0))?)
}

/// Marks `id` primary and clears every other vehicle in one statement.
/// Rows whose flag changes get `updated_at = now`.
///
/// Returns `false` when no vehicle has that id (nothing is changed).
pub fn set_primary_vehicle(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<bool> {
    if fetch_vehicle(conn, id)?.is_none() {
        return Ok(false);
    }
    conn.execute(
        "UPDATE vehicle
         SET is_primary = (id = ?1), updated_at = ?2
         WHERE is_primary != (id = ?1)",
        params![id, now],
    )?;
    Ok(true)
}

/// Clears the primary flag on every vehicle except `keep_id`.
pub fn clear_primary_except(conn: &Connection, keep_id: &str, now: DateTime<Utc>) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE vehicle SET is_primary = 0, updated_at = ?2 WHERE is_primary = 1 AND id != ?1",
        params![keep_id, now],
    )?)
}

/// Repairs a table with several primaries: the most recently updated keeps
/// the flag. Returns the number of rows cleared.
pub fn normalize_primary(conn: &Connection) -> Result<usize> {
    let keep: Option<String> = conn
        .query_row(
            "SELECT id FROM vehicle WHERE is_primary = 1 ORDER BY updated_at DESC, id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match keep {
        Some(keep) => Ok(conn.execute(
            "UPDATE vehicle SET is_primary = 0 WHERE is_primary = 1 AND id != ?1",
            [keep],
        )?),
        None => Ok(0),
    }
}

// --- file_metadata ---

pub fn upsert_file(conn: &Connection, record: &FileMetadataRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO file_metadata (id, vehicle_id, file_name, relative_path, document_type,
                                    document_name, date, mileage, amount, file_size, mime_type,
                                    created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
           vehicle_id = excluded.vehicle_id,
           file_name = excluded.file_name,
           relative_path = excluded.relative_path,
           document_type = excluded.document_type,
           document_name = excluded.document_name,
           date = excluded.date,
           mileage = excluded.mileage,
           amount = excluded.amount,
           file_size = excluded.file_size,
           mime_type = excluded.mime_type,
           created_at = excluded.created_at,
           modified_at = excluded.modified_at",
        params![
            record.id,
            record.vehicle_id,
            record.file_name,
            record.relative_path,
            record.document_type,
            record.document_name,
            record.date,
            record.mileage,
            record.amount,
            record.file_size,
            record.mime_type,
            record.created_at,
            record.modified_at,
        ],
    )?;
    Ok(())
}

pub fn fetch_file(conn: &Connection, id: &str) -> Result<Option<FileMetadataRecord>> {
    let sql = format!("SELECT {} FROM file_metadata WHERE id = ?1", FILE_COLUMNS);
    Ok(conn.query_row(&sql, [id], file_from_row).optional()?)
}

/// Documents of one vehicle, newest document date first.
pub fn fetch_files_for_vehicle(conn: &Connection, vehicle_id: &str) -> Result<Vec<FileMetadataRecord>> {
    let sql = format!(
        "SELECT {} FROM file_metadata WHERE vehicle_id = ?1 ORDER BY date DESC, id",
        FILE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([vehicle_id], file_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_file(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM file_metadata WHERE id = ?1", [id])? > 0)
}

pub fn count_files(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM file_metadata", [], |row| row.get(0))?)
}

pub fn count_files_for_vehicle(conn: &Connection, vehicle_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT count(*) FROM file_metadata WHERE vehicle_id = ?1",
        [vehicle_id],
        |row| row.get(0),
    )?)
}
