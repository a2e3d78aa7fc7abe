//! Terminal output. Styles come from `console`, which drops colors when
//! stdout is not a terminal.

use console::Style;
use gloveboxapp::commands::{CmdMessage, CmdResult, MessageLevel};
use gloveboxapp::model::{Document, DocumentType, Vehicle, VehicleType};

struct Styles {
    muted: Style,
    primary: Style,
    index: Style,
    success: Style,
    warning: Style,
    error: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            muted: Style::new().dim(),
            primary: Style::new().yellow().bold(),
            index: Style::new().yellow(),
            success: Style::new().green(),
            warning: Style::new().yellow().bold(),
            error: Style::new().red().bold(),
        }
    }
}

pub fn print_messages(messages: &[CmdMessage]) {
    let styles = Styles::new();
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content),
            MessageLevel::Success => println!("{}", styles.success.apply_to(&message.content)),
            MessageLevel::Warning => eprintln!("{}", styles.warning.apply_to(&message.content)),
            MessageLevel::Error => eprintln!("{}", styles.error.apply_to(&message.content)),
        }
    }
}

pub fn print_paths(result: &CmdResult) {
    let styles = Styles::new();
    for path in &result.paths {
        println!("{}", styles.muted.apply_to(path.display()));
    }
}

pub fn print_vehicle_list(vehicles: &[Vehicle]) {
    for line in vehicle_list_lines(vehicles) {
        println!("{}", line);
    }
}

pub fn print_vehicle(vehicle: &Vehicle) {
    for line in vehicle_lines(vehicle) {
        println!("{}", line);
    }
}

fn vehicle_list_lines(vehicles: &[Vehicle]) -> Vec<String> {
    let styles = Styles::new();
    vehicles
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let marker = if v.is_primary {
                styles.primary.apply_to("★").to_string()
            } else {
                " ".to_string()
            };
            format!(
                "{} {} {}  {}  {}",
                styles.index.apply_to(format!("{:>2}.", i + 1)),
                marker,
                v.display_name(),
                styles.muted.apply_to(&v.plate),
                styles
                    .muted
                    .apply_to(format!("{} document(s)", v.documents.len())),
            )
        })
        .collect()
}

fn vehicle_lines(vehicle: &Vehicle) -> Vec<String> {
    let styles = Styles::new();
    let mut lines = Vec::new();

    let title = if vehicle.is_primary {
        format!("{} {}", vehicle.display_name(), styles.primary.apply_to("★"))
    } else {
        vehicle.display_name()
    };
    lines.push(Style::new().bold().apply_to(title).to_string());
    lines.push(format!(
        "  {} · {} · registered {}",
        vehicle_type_label(vehicle.vehicle_type),
        if vehicle.plate.is_empty() { "no plate" } else { vehicle.plate.as_str() },
        vehicle.registration_date.format("%Y-%m-%d")
    ));
    if let Some(mileage) = &vehicle.mileage {
        lines.push(format!("  {}", mileage));
    }
    lines.push(styles.muted.apply_to(format!("  id {}", vehicle.id)).to_string());

    if vehicle.documents.is_empty() {
        lines.push(String::new());
        lines.push(styles.muted.apply_to("  No documents.").to_string());
        return lines;
    }

    lines.push(String::new());
    for (i, doc) in vehicle.documents.iter().enumerate() {
        lines.push(document_line(i + 1, doc, &styles));
    }
    lines
}

fn document_line(index: usize, doc: &Document, styles: &Styles) -> String {
    let amount = doc
        .amount
        .map(|a| format!("  {:.2}", a))
        .unwrap_or_default();
    format!(
        "{} {}  {:<12} {}{}  {}",
        styles.index.apply_to(format!("{:>3}.", index)),
        doc.date.format("%Y-%m-%d"),
        document_type_label(doc.document_type),
        doc.name,
        amount,
        styles.muted.apply_to(doc.file_name()),
    )
}

fn vehicle_type_label(t: VehicleType) -> &'static str {
    match t {
        VehicleType::Car => "Car",
        VehicleType::Motorcycle => "Motorcycle",
        VehicleType::Truck => "Truck",
        VehicleType::Bicycle => "Bicycle",
        VehicleType::Other => "Other",
    }
}

fn document_type_label(t: DocumentType) -> &'static str {
    match t {
        DocumentType::TechnicalInspection => "Inspection",
        DocumentType::Maintenance => "Maintenance",
        DocumentType::Repair => "Repair",
        DocumentType::Other => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn vehicle(primary: bool) -> Vehicle {
        let mut v = Vehicle::new(
            VehicleType::Car,
            "Toyota",
            "Corolla",
            "AB-123-CD",
            Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap(),
        );
        v.is_primary = primary;
        v
    }

    #[test]
    fn list_lines_are_numbered() {
        console::set_colors_enabled(false);
        let lines = vehicle_list_lines(&[vehicle(true), vehicle(false)]);
        assert!(lines[0].starts_with(" 1. ★ Toyota Corolla"));
        assert!(lines[1].starts_with(" 2.   Toyota Corolla"));
        assert!(lines[0].ends_with("0 document(s)"));
    }

    #[test]
    fn vehicle_without_documents() {
        console::set_colors_enabled(false);
        let lines = vehicle_lines(&vehicle(false));
        assert_eq!(lines[0], "Toyota Corolla");
        assert!(lines[1].contains("registered 2019-03-01"));
        assert!(lines.last().unwrap().contains("No documents."));
    }
}
