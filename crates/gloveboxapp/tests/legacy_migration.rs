use gloveboxapp::init::{initialize, GloveboxContext};
use gloveboxapp::legacy::MigrationOutcome;
use gloveboxapp::sync::read_sidecar;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

const V1: &str = "6f1c1f8e-3a55-4b0e-9d38-2b7f3f5c0a01";
const V2: &str = "6f1c1f8e-3a55-4b0e-9d38-2b7f3f5c0a02";
const V3: &str = "6f1c1f8e-3a55-4b0e-9d38-2b7f3f5c0a03";

fn setup() -> (TempDir, TempDir, GloveboxContext) {
    let root = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    let ctx = initialize(Some(data.path().to_path_buf())).unwrap();
    ctx.api.storage().save_storage_folder(root.path()).unwrap();
    (root, data, ctx)
}

fn app_dir(root: &Path) -> PathBuf {
    root.join("Glovebox")
}

fn write_legacy(root: &Path, value: serde_json::Value) {
    fs::write(
        app_dir(root).join("vehicles.json"),
        serde_json::to_vec_pretty(&value).unwrap(),
    )
    .unwrap();
}

/// A file outside the app folder, as the old app kept them.
fn loose_file(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    Url::from_file_path(&path).unwrap().to_string()
}

fn legacy_vehicle(id: &str, brand: &str, model: &str, docs: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "type": "car",
        "brand": brand,
        "model": model,
        "mileage": "120 000 km",
        // Seconds since 2001-01-01, the old app's date encoding.
        "registrationDate": 600000000.0,
        "plate": "XY-987-ZZ",
        "isPrimary": id == V1,
        "documents": docs
    })
}

fn migrate(ctx: &GloveboxContext) -> MigrationOutcome {
    ctx.launch().migration.expect("storage is configured")
}

#[test]
fn test_no_legacy_file_sets_flag() {
    let (_root, _data, ctx) = setup();
    assert_eq!(migrate(&ctx), MigrationOutcome::NoLegacyData);
    assert_eq!(migrate(&ctx), MigrationOutcome::AlreadyMigrated);
}

#[test]
fn test_full_migration_imports_everything() {
    let (root, _data, ctx) = setup();
    let old_docs = TempDir::new().unwrap();
    write_legacy(
        root.path(),
        json!([
            legacy_vehicle(V1, "Skoda", "Octavia", json!([
                {
                    "id": "4d4f1a2c-0000-4000-8000-000000000001",
                    "fileURL": loose_file(old_docs.path(), "revision.pdf"),
                    "name": "Revision",
                    "date": "2022-05-10T09:00:00Z",
                    "mileage": "100000",
                    "type": "maintenance",
                    "amount": 189.0
                },
                {
                    "id": "not-a-uuid",
                    "fileURL": loose_file(old_docs.path(), "photo.jpg"),
                    "name": "Photo",
                    "date": 700000000,
                    "mileage": "",
                    "type": "other"
                }
            ])),
            legacy_vehicle(V2, "Mazda", "MX-5", json!([])),
        ]),
    );

    assert_eq!(
        migrate(&ctx),
        MigrationOutcome::Success {
            vehicles: 2,
            documents: 2
        }
    );

    let repo = ctx.api.repository();
    let octavia = repo.get_vehicle(V1).unwrap();
    assert!(octavia.is_primary);
    assert_eq!(octavia.mileage.as_deref(), Some("120 000 km"));
    assert_eq!(octavia.documents.len(), 2);

    let folder = app_dir(root.path()).join("Vehicles/SkodaOctavia");
    for doc in &octavia.documents {
        assert_eq!(doc.file_path.parent(), Some(folder.as_path()));
        assert!(doc.file_path.is_file());
    }
    let sidecar = read_sidecar(&folder).unwrap().unwrap();
    assert_eq!(sidecar.files.len(), 2);
    assert!(app_dir(root.path()).join("Vehicles/MazdaMX-5").is_dir());
}

#[test]
fn test_migration_is_idempotent() {
    let (root, _data, ctx) = setup();
    write_legacy(
        root.path(),
        json!([legacy_vehicle(V1, "Skoda", "Octavia", json!([]))]),
    );
    assert!(matches!(migrate(&ctx), MigrationOutcome::Success { .. }));

    // New entries in the old file are ignored once the flag is set.
    write_legacy(
        root.path(),
        json!([
            legacy_vehicle(V1, "Skoda", "Octavia", json!([])),
            legacy_vehicle(V2, "Mazda", "MX-5", json!([])),
        ]),
    );
    assert_eq!(migrate(&ctx), MigrationOutcome::AlreadyMigrated);
    assert_eq!(ctx.api.repository().vehicle_count().unwrap(), 1);
}

#[test]
fn test_partial_migration_records_failures() {
    let (root, _data, ctx) = setup();
    let old_docs = TempDir::new().unwrap();
    write_legacy(
        root.path(),
        json!([
            legacy_vehicle(V1, "Skoda", "Octavia", json!([])),
            legacy_vehicle(V2, "Mazda", "MX-5", json!([{
                "id": "4d4f1a2c-0000-4000-8000-000000000002",
                "fileURL": Url::from_file_path(old_docs.path().join("gone.pdf")).unwrap().to_string(),
                "name": "Gone",
                "date": "2021-01-01T00:00:00Z",
                "mileage": "",
                "type": "repair"
            }])),
            legacy_vehicle(V3, "Opel", "Corsa", json!([])),
        ]),
    );

    match migrate(&ctx) {
        MigrationOutcome::PartialSuccess {
            vehicles,
            documents,
            failures,
        } => {
            assert_eq!(vehicles, 3);
            assert_eq!(documents, 0);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].vehicle_id, V2);
            assert_eq!(
                failures[0].document_id.as_deref(),
                Some("4d4f1a2c-0000-4000-8000-000000000002")
            );
        }
        other => panic!("expected partial success, got {:?}", other),
    }
    assert_eq!(ctx.api.repository().vehicle_count().unwrap(), 3);
    // Partial success is terminal too.
    assert_eq!(migrate(&ctx), MigrationOutcome::AlreadyMigrated);
}

#[test]
fn test_unparseable_legacy_file_is_retried() {
    let (root, _data, ctx) = setup();
    fs::write(app_dir(root.path()).join("vehicles.json"), b"[{ broken").unwrap();

    assert!(matches!(migrate(&ctx), MigrationOutcome::Failure(_)));
    assert!(matches!(migrate(&ctx), MigrationOutcome::Failure(_)));

    write_legacy(
        root.path(),
        json!([legacy_vehicle(V1, "Skoda", "Octavia", json!([]))]),
    );
    assert!(matches!(migrate(&ctx), MigrationOutcome::Success { .. }));
}

#[test]
fn test_document_found_in_vehicle_folder_when_url_is_stale() {
    let (root, _data, ctx) = setup();
    let folder = app_dir(root.path()).join("Vehicles/SkodaOctavia");
    fs::create_dir_all(&folder).unwrap();
    fs::write(folder.join("invoice.pdf"), b"pdf").unwrap();
    write_legacy(
        root.path(),
        json!([legacy_vehicle(V1, "Skoda", "Octavia", json!([{
            "id": "4d4f1a2c-0000-4000-8000-000000000003",
            "fileURL": "file:///private/var/mobile/Containers/Data/Application/OLD/Documents/invoice.pdf",
            "name": "Invoice",
            "date": "2020-02-02T00:00:00Z",
            "mileage": "",
            "type": "repair"
        }]))]),
    );

    assert_eq!(
        migrate(&ctx),
        MigrationOutcome::Success {
            vehicles: 1,
            documents: 1
        }
    );
    let doc = &ctx.api.repository().get_vehicle(V1).unwrap().documents[0];
    assert_eq!(doc.file_path, folder.join("invoice.pdf"));
}
