use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use gloveboxapp::model::{DocumentType, VehicleType};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "GLOVEBOX_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "glovebox",
    bin_name = "glovebox",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Keep every vehicle's papers in a folder you own", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Private data directory (database, settings, glovebox.toml)
    #[arg(long, global = true, help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Choose, show or forget the storage folder
    #[command(display_order = 1)]
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },

    /// Summary of storage, vehicles and documents
    #[command(display_order = 2)]
    Status,

    /// List vehicles
    #[command(alias = "ls", display_order = 10)]
    List,

    /// Show a vehicle and its documents (default: the last opened one)
    #[command(alias = "v", display_order = 11)]
    Show {
        /// Index, id prefix or name of the vehicle
        vehicle: Option<String>,
    },

    /// Add a vehicle
    #[command(display_order = 12)]
    Add {
        #[arg(long)]
        brand: String,

        #[arg(long)]
        model: String,

        #[arg(long = "type", value_enum, default_value_t = VehicleKind::Car)]
        kind: VehicleKind,

        #[arg(long, default_value = "")]
        plate: String,

        /// First registration, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        registered: Option<DateTime<Utc>>,

        /// Free-form mileage, e.g. "150 000 km"
        #[arg(long)]
        mileage: Option<String>,

        /// Make it the primary vehicle
        #[arg(long)]
        primary: bool,
    },

    /// Edit a vehicle
    #[command(display_order = 13)]
    Edit {
        vehicle: String,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long = "type", value_enum)]
        kind: Option<VehicleKind>,

        #[arg(long)]
        plate: Option<String>,

        #[arg(long, value_parser = parse_date)]
        registered: Option<DateTime<Utc>>,

        #[arg(long, conflicts_with = "clear_mileage")]
        mileage: Option<String>,

        #[arg(long)]
        clear_mileage: bool,
    },

    /// Delete a vehicle, its documents and its folder
    #[command(alias = "rm", display_order = 14)]
    Remove { vehicle: String },

    /// Make a vehicle the primary one
    #[command(display_order = 15)]
    Primary { vehicle: String },

    /// Attach, edit or remove documents
    #[command(alias = "docs", display_order = 20)]
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Rebuild the database from the vehicle folders
    #[command(display_order = 30)]
    Rebuild {
        /// Re-import every folder even when the database is not empty
        #[arg(long)]
        force: bool,
    },

    /// Import data from the previous version (runs once)
    #[command(display_order = 31)]
    Migrate,

    /// Check and repair the database against the folders
    #[command(display_order = 32)]
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum StorageAction {
    /// Use PATH as the storage root
    Set { path: PathBuf },
    /// Show the storage root
    Show,
    /// Forget the storage root (files stay on disk)
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum DocAction {
    /// Copy FILE into the vehicle's folder and record it
    Add {
        vehicle: String,
        file: PathBuf,

        /// Display name (default: the file name without extension)
        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", value_enum, default_value_t = DocKind::Other)]
        kind: DocKind,

        /// YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,

        #[arg(long, default_value = "")]
        mileage: String,

        #[arg(long)]
        amount: Option<f64>,
    },

    /// Edit a document's details
    Edit {
        vehicle: String,
        /// Index within the vehicle or id prefix
        document: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", value_enum)]
        kind: Option<DocKind>,

        #[arg(long, value_parser = parse_date)]
        date: Option<DateTime<Utc>>,

        #[arg(long)]
        mileage: Option<String>,

        #[arg(long, conflicts_with = "clear_amount")]
        amount: Option<f64>,

        #[arg(long)]
        clear_amount: bool,
    },

    /// Delete a document and its file
    #[command(alias = "rm")]
    Remove { vehicle: String, document: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VehicleKind {
    Car,
    Motorcycle,
    Truck,
    Bicycle,
    Other,
}

impl From<VehicleKind> for VehicleType {
    fn from(kind: VehicleKind) -> Self {
        match kind {
            VehicleKind::Car => VehicleType::Car,
            VehicleKind::Motorcycle => VehicleType::Motorcycle,
            VehicleKind::Truck => VehicleType::Truck,
            VehicleKind::Bicycle => VehicleType::Bicycle,
            VehicleKind::Other => VehicleType::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocKind {
    Inspection,
    Maintenance,
    Repair,
    Other,
}

impl From<DocKind> for DocumentType {
    fn from(kind: DocKind) -> Self {
        match kind {
            DocKind::Inspection => DocumentType::TechnicalInspection,
            DocKind::Maintenance => DocumentType::Maintenance,
            DocKind::Repair => DocumentType::Repair,
            DocKind::Other => DocumentType::Other,
        }
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| format!("'{}' is not a date (expected YYYY-MM-DD)", value))
}

/// Installs the stderr subscriber. `GLOVEBOX_LOG` wins over `-v`.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn naked_invocation_has_no_command() {
        let cli = Cli::try_parse_from(["glovebox"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn add_parses_type_and_date() {
        let cli = Cli::try_parse_from([
            "glovebox", "add", "--brand", "Honda", "--model", "CB500", "--type", "motorcycle",
            "--registered", "2019-06-01", "--primary",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Add {
                kind,
                registered,
                primary,
                ..
            }) => {
                assert_eq!(kind, VehicleKind::Motorcycle);
                assert_eq!(
                    registered,
                    Some(Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap())
                );
                assert!(primary);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(Cli::try_parse_from([
            "glovebox", "add", "--brand", "A", "--model", "B", "--registered", "June"
        ])
        .is_err());
    }

    #[test]
    fn amount_and_clear_amount_conflict() {
        assert!(Cli::try_parse_from([
            "glovebox",
            "doc",
            "edit",
            "1",
            "1",
            "--amount",
            "3",
            "--clear-amount"
        ])
        .is_err());
    }

    #[test]
    fn global_data_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["glovebox", "list", "--data", "/tmp/gb"]).unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/gb")));
    }
}
