//! # Glovebox
//!
//! Per-vehicle document records. Each vehicle owns a folder in a storage
//! root the user picks (usually a cloud-synced folder). The folder holds
//! the vehicle's documents plus a JSON sidecar that describes them, so the
//! folder tree alone is enough to restore everything on another device.
//!
//! ## Layers
//!
//! ```text
//! client (CLI) ─> api ─> commands ─> repository ─┬─> db       (SQLite, authoritative)
//!                                                ├─> sync     (sidecar per vehicle)
//!                                                ├─> legacy   (flat-file mirror)
//!                                                └─> storage  (folders and files)
//! ```
//!
//! - [`storage`]: the storage root, the app folder and every file operation
//!   under it
//! - [`db`]: the SQLite store with its migrations and row-level queries
//! - [`mapping`]: conversions between domain values, rows and sidecar DTOs
//! - [`repository`]: the transaction boundary for every use case
//! - [`sync`]: sidecar writes and the scan-and-rebuild of an empty database
//! - [`legacy`]: the pre-database flat file and its one-time migration
//! - [`commands`] and [`api`]: use cases returning structured results
//! - [`init`]: wiring and the launch sequence
//!
//! ## On Disk
//!
//! ```text
//! <root>/
//!   Glovebox/
//!     vehicles.json                 # legacy flat file
//!     Vehicles/
//!       ToyotaCorolla/
//!         .vehicle_metadata.json    # sidecar
//!         invoice.pdf
//! ```
//!
//! The database and settings live in a private data directory (see
//! [`init`]). They can be deleted at any time: the next launch rebuilds the
//! database from the sidecars.

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod init;
pub mod legacy;
pub mod mapping;
pub mod model;
pub mod repository;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod transfer;

#[cfg(test)]
mod test_utils;
