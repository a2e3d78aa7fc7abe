//! # Configuration
//!
//! Glovebox configuration is managed by [`clapfig`], which handles layered
//! loading from TOML files, environment variables, and compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `GLOVEBOX__APP_FOLDER_NAME`, `GLOVEBOX__MIRROR_LEGACY`, etc.
//! 2. **Config file**: `glovebox.toml` in the data directory.
//! 3. **Compiled defaults**: `#[config(default = ...)]` below.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `app_folder_name` | `Glovebox` | Folder created under the chosen storage root |
//! | `database_file` | `glovebox.sqlite` | Database file name in the data directory |
//! | `legacy_file_name` | `vehicles.json` | Legacy flat file in the app folder |
//! | `mirror_legacy` | `true` | Keep the legacy flat file up to date |

use confique::Config;
use serde::{Deserialize, Serialize};

/// Configuration for glovebox, stored in `glovebox.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GloveboxConfig {
    /// Folder created under the storage root to hold everything glovebox writes.
    #[config(default = "Glovebox")]
    pub app_folder_name: String,

    /// SQLite database file, relative to the data directory.
    #[config(default = "glovebox.sqlite")]
    pub database_file: String,

    /// Legacy flat file holding every vehicle, relative to the app folder.
    #[config(default = "vehicles.json")]
    pub legacy_file_name: String,

    /// Mirror every change into the legacy flat file.
    #[config(default = true)]
    pub mirror_legacy: bool,
}

impl Default for GloveboxConfig {
    fn default() -> Self {
        Self {
            app_folder_name: "Glovebox".to_string(),
            database_file: "glovebox.sqlite".to_string(),
            legacy_file_name: "vehicles.json".to_string(),
            mirror_legacy: true,
        }
    }
}

impl GloveboxConfig {
    /// The app folder name, falling back to the default when blank.
    pub fn app_folder_name(&self) -> &str {
        let name = self.app_folder_name.trim();
        if name.is_empty() {
            "Glovebox"
        } else {
            name
        }
    }
}
