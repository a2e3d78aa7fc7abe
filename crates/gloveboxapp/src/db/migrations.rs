//! Named, ordered schema migrations.
//!
//! Each migration is recorded by name in `schema_migrations` once applied and
//! is never run again. Migrations apply in list order, each in its own
//! transaction, so a failure leaves every earlier migration committed.

use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_vehicle_and_file_metadata",
        sql: include_str!("../../migrations/0001_create_vehicle_and_file_metadata.sql"),
    },
    Migration {
        name: "0002_add_lookup_indexes",
        sql: include_str!("../../migrations/0002_add_lookup_indexes.sql"),
    },
];

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    name       TEXT PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Applies every migration in `migrations` not yet recorded.
/// Returns the names applied by this call.
pub fn apply_migrations(
    conn: &mut Connection,
    migrations: &[Migration],
) -> Result<Vec<&'static str>> {
    conn.execute_batch(CREATE_LEDGER)?;
    let applied: HashSet<String> = applied_migrations(conn)?.into_iter().collect();

    let mut newly_applied = Vec::new();
    for migration in migrations {
        if applied.contains(migration.name) {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            params![migration.name, Utc::now()],
        )?;
        tx.commit()?;
        info!(migration = migration.name, "applied schema migration");
        newly_applied.push(migration.name);
    }
    Ok(newly_applied)
}

pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY rowid")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn applies_all_migrations_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        let first = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());
        assert!(table_exists(&conn, "vehicle"));
        assert!(table_exists(&conn, "file_metadata"));

        let second = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert!(second.is_empty());
        assert_eq!(
            applied_migrations(&conn).unwrap(),
            MIGRATIONS.iter().map(|m| m.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn only_new_migrations_run_on_upgrade() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, &MIGRATIONS[..1]).unwrap();

        let applied = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(applied, vec!["0002_add_lookup_indexes"]);
    }

    #[test]
    fn failed_migration_is_not_recorded() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = [
            MIGRATIONS[0],
            Migration {
                name: "9999_broken",
                sql: "CREATE TABLE nope (",
            },
        ];
        assert!(apply_migrations(&mut conn, &broken).is_err());
        assert_eq!(
            applied_migrations(&conn).unwrap(),
            vec!["0001_create_vehicle_and_file_metadata".to_string()]
        );
    }
}
