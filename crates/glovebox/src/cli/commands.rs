use super::render;
use super::setup::{init_logging, Cli, Commands, DocAction, StorageAction};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use gloveboxapp::api::GloveboxApi;
use gloveboxapp::commands::documents::DocumentEdit;
use gloveboxapp::commands::vehicles::{VehicleEdit, VehicleInput};
use gloveboxapp::commands::{maintenance, CmdResult};
use gloveboxapp::init::initialize;
use gloveboxapp::model::{DocumentSource, NewDocument};
use gloveboxapp::storage::StorageState;
use std::path::Path;
use tracing::debug;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = initialize(cli.data.clone()).context("could not initialize glovebox")?;
    debug!(data_dir = %ctx.data_dir.display(), "context ready");

    let command = cli.command.unwrap_or(Commands::List);
    if needs_launch(&command) {
        print_launch(&ctx.api);
    }
    dispatch(&ctx.api, command)
}

/// Storage management and status work on the raw state and skip the
/// launch tasks.
fn needs_launch(command: &Commands) -> bool {
    !matches!(command, Commands::Storage { .. } | Commands::Status)
}

fn print_launch(api: &GloveboxApi) {
    let report = api.launch();
    // The command itself reports missing storage.
    if report.storage == StorageState::NotConfigured {
        return;
    }
    let mut result = CmdResult::default();
    maintenance::describe_launch(&report, &mut result);
    result.paths.clear();
    render::print_messages(&result.messages);
}

fn dispatch(api: &GloveboxApi, command: Commands) -> Result<()> {
    match command {
        Commands::Storage { action } => {
            let result = match action {
                StorageAction::Set { path } => api.configure_storage(&absolute(&path)?)?,
                StorageAction::Show => api.show_storage()?,
                StorageAction::Clear => api.clear_storage()?,
            };
            render::print_paths(&result);
            render::print_messages(&result.messages);
        }
        Commands::Status => render::print_messages(&api.status()?.messages),
        Commands::List => {
            let result = api.list_vehicles()?;
            render::print_vehicle_list(&result.listed_vehicles);
            render::print_messages(&result.messages);
        }
        Commands::Show { vehicle } => {
            let result = api.show_vehicle(vehicle.as_deref())?;
            for vehicle in &result.listed_vehicles {
                render::print_vehicle(vehicle);
            }
            render::print_messages(&result.messages);
        }
        Commands::Add {
            brand,
            model,
            kind,
            plate,
            registered,
            mileage,
            primary,
        } => {
            let input = VehicleInput {
                vehicle_type: kind.into(),
                brand,
                model,
                plate,
                registration_date: registered.unwrap_or_else(Utc::now),
                mileage,
                primary,
            };
            render::print_messages(&api.add_vehicle(input)?.messages);
        }
        Commands::Edit {
            vehicle,
            brand,
            model,
            kind,
            plate,
            registered,
            mileage,
            clear_mileage,
        } => {
            let edit = VehicleEdit {
                vehicle_type: kind.map(Into::into),
                brand,
                model,
                plate,
                registration_date: registered,
                mileage: if clear_mileage { Some(None) } else { mileage.map(Some) },
            };
            render::print_messages(&api.edit_vehicle(&vehicle, edit)?.messages);
        }
        Commands::Remove { vehicle } => {
            render::print_messages(&api.remove_vehicle(&vehicle)?.messages)
        }
        Commands::Primary { vehicle } => {
            render::print_messages(&api.set_primary_vehicle(&vehicle)?.messages)
        }
        Commands::Doc { action } => dispatch_doc(api, action)?,
        Commands::Rebuild { force } => render::print_messages(&api.rebuild(force)?.messages),
        Commands::Migrate => render::print_messages(&api.migrate()?.messages),
        Commands::Doctor => render::print_messages(&api.doctor()?.messages),
    }
    Ok(())
}

fn dispatch_doc(api: &GloveboxApi, action: DocAction) -> Result<()> {
    let result = match action {
        DocAction::Add {
            vehicle,
            file,
            name,
            kind,
            date,
            mileage,
            amount,
        } => {
            if !file.is_file() {
                anyhow::bail!("{} is not a file", file.display());
            }
            let name = name.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Document".to_string())
            });
            let document = NewDocument {
                source: DocumentSource::File(file),
                name,
                date: date.unwrap_or_else(Utc::now),
                mileage,
                document_type: kind.into(),
                amount,
            };
            api.add_document(&vehicle, document)?
        }
        DocAction::Edit {
            vehicle,
            document,
            name,
            kind,
            date,
            mileage,
            amount,
            clear_amount,
        } => {
            let edit = DocumentEdit {
                name,
                date,
                mileage,
                document_type: kind.map(Into::into),
                amount: if clear_amount { Some(None) } else { amount.map(Some) },
            };
            api.edit_document(&vehicle, &document, edit)?
        }
        DocAction::Remove { vehicle, document } => api.remove_document(&vehicle, &document)?,
    };
    render::print_messages(&result.messages);
    Ok(())
}

fn absolute(path: &Path) -> Result<std::path::PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not read the current directory")?;
    Ok(cwd.join(path))
}
