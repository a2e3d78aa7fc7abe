use super::VehicleRepository;
use crate::db::records;
use crate::error::{GloveboxError, Result};
use crate::mapping;
use crate::model::{mime_type_for, Document, DocumentSource, NewDocument};
use crate::storage::is_contained_path;
use chrono::Utc;
use std::fs;
use tracing::{info, warn};
use uuid::Uuid;

impl VehicleRepository {
    /// Stores the document's file in the vehicle folder and records it.
    ///
    /// The file is written first. If the row cannot be written the file is
    /// removed again, so a failed add leaves nothing behind.
    pub fn add_document(&self, vehicle_id: &str, new: NewDocument) -> Result<Document> {
        let _guard = self.lock();
        let record = self
            .db
            .read(|conn| records::fetch_vehicle(conn, vehicle_id))?
            .ok_or_else(|| GloveboxError::VehicleNotFound(vehicle_id.to_string()))?;

        self.require_storage()?;
        let folder = self.storage.create_vehicle_folder(&record.folder_path)?;
        let file_name = new.source.file_name();
        let path = match &new.source {
            DocumentSource::Bytes { data, .. } => self.storage.save_file(data, &file_name, &folder)?,
            DocumentSource::File(source) => {
                self.storage.copy_file_into(source, &file_name, &folder)?
            }
        };

        let now = Utc::now();
        let stored_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file_name);
        let document = Document {
            id: Uuid::new_v4(),
            file_size: fs::metadata(&path).map(|m| m.len() as i64).unwrap_or(0),
            mime_type: mime_type_for(&stored_name),
            file_path: path.clone(),
            name: new.name,
            date: new.date,
            mileage: new.mileage,
            document_type: new.document_type,
            amount: new.amount,
            created_at: now,
            modified_at: now,
        };

        let file = mapping::document_to_record(&document, vehicle_id, &folder);
        if let Err(e) = self.db.write(|tx| records::upsert_file(tx, &file)) {
            if let Err(remove_err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %remove_err, "could not remove unrecorded file");
            }
            return Err(e);
        }
        info!(vehicle = vehicle_id, document = %document.id, file = %file.relative_path, "document added");

        self.after_change(vehicle_id, false);
        Ok(document)
    }

    /// Saves edited document fields. The file itself is not touched, so
    /// path, size and MIME type keep their stored values.
    pub fn update_document(&self, document: Document) -> Result<Document> {
        let _guard = self.lock();
        let id = document.id.to_string();
        let existing = self
            .db
            .read(|conn| records::fetch_file(conn, &id))?
            .ok_or(GloveboxError::DocumentNotFound(document.id))?;

        let mut updated = existing.clone();
        updated.document_name = document.name;
        updated.date = document.date;
        updated.mileage = document.mileage;
        updated.document_type = document.document_type.as_str().to_string();
        updated.amount = document.amount;
        updated.modified_at = Utc::now();
        self.db.write(|tx| records::upsert_file(tx, &updated))?;
        info!(vehicle = %existing.vehicle_id, document = %id, "document updated");

        self.after_change(&existing.vehicle_id, false);
        self.get_document(document.id)
    }

    /// Forgets the document and deletes its file. A stored path that leaves
    /// the vehicle folder is never deleted; only the row goes.
    pub fn delete_document(&self, id: Uuid) -> Result<()> {
        let _guard = self.lock();
        let key = id.to_string();
        let (file, vehicle) = self.db.read(|conn| {
            let file = records::fetch_file(conn, &key)?.ok_or(GloveboxError::DocumentNotFound(id))?;
            let vehicle = records::fetch_vehicle(conn, &file.vehicle_id)?
                .ok_or_else(|| GloveboxError::VehicleNotFound(file.vehicle_id.clone()))?;
            Ok((file, vehicle))
        })?;

        self.db.write(|tx| records::delete_file(tx, &key))?;
        info!(vehicle = %vehicle.id, document = %key, "document deleted");

        match self.folder_of(&vehicle) {
            Ok(_) if !is_contained_path(&file.relative_path) => {
                warn!(
                    document = %key,
                    path = %file.relative_path,
                    "document path leaves the vehicle folder, file left in place"
                );
            }
            Ok(folder) => {
                let path = folder.join(&file.relative_path);
                if path.is_file() {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "could not delete document file");
                    }
                }
            }
            Err(e) => warn!(document = %key, error = %e, "document file left in place"),
        }

        self.after_change(&vehicle.id, false);
        Ok(())
    }

    pub fn get_document(&self, id: Uuid) -> Result<Document> {
        let key = id.to_string();
        let (file, vehicle) = self.db.read(|conn| {
            let file = records::fetch_file(conn, &key)?.ok_or(GloveboxError::DocumentNotFound(id))?;
            let vehicle = records::fetch_vehicle(conn, &file.vehicle_id)?
                .ok_or_else(|| GloveboxError::VehicleNotFound(file.vehicle_id.clone()))?;
            Ok((file, vehicle))
        })?;
        let folder = self.folder_of(&vehicle)?;
        mapping::document_from_record(&file, &folder).ok_or(GloveboxError::DocumentNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::records;
    use crate::error::GloveboxError;
    use crate::model::{DocumentSource, DocumentType, NewDocument, Vehicle, VehicleType};
    use crate::sync::read_sidecar;
    use crate::test_utils::TestEnv;
    use chrono::Utc;
    use std::fs;
    use uuid::Uuid;

    fn bytes(name: &str, data: &[u8]) -> NewDocument {
        NewDocument {
            source: DocumentSource::Bytes {
                data: data.to_vec(),
                file_name: name.to_string(),
            },
            name: "Invoice".to_string(),
            date: Utc::now(),
            mileage: "12000".to_string(),
            document_type: DocumentType::Repair,
            amount: Some(120.0),
        }
    }

    fn setup() -> (TestEnv, crate::repository::VehicleRepository, Vehicle) {
        let env = TestEnv::new();
        let repo = env.repository();
        let v = repo
            .create_vehicle(Vehicle::new(VehicleType::Car, "Renault", "Clio", "P", Utc::now()))
            .unwrap();
        (env, repo, v)
    }

    #[test]
    fn test_add_document_writes_file_row_and_sidecar() {
        let (env, repo, v) = setup();
        let doc = repo.add_document(&v.id, bytes("invoice.pdf", b"%PDF")).unwrap();

        assert!(doc.file_path.is_file());
        assert_eq!(doc.file_size, 4);
        assert_eq!(doc.mime_type, "application/pdf");

        let loaded = repo.get_vehicle(&v.id).unwrap();
        assert_eq!(loaded.documents, vec![doc.clone()]);

        let folder = env.storage.vehicle_folder("RenaultClio").unwrap();
        let sidecar = read_sidecar(&folder).unwrap().unwrap();
        assert_eq!(sidecar.files.len(), 1);
        assert_eq!(sidecar.files[0].relative_path, "invoice.pdf");
    }

    #[test]
    fn test_same_file_name_twice_keeps_both() {
        let (_env, repo, v) = setup();
        let a = repo.add_document(&v.id, bytes("scan.jpg", b"a")).unwrap();
        let b = repo.add_document(&v.id, bytes("scan.jpg", b"b")).unwrap();
        assert_ne!(a.file_path, b.file_path);
        assert_eq!(fs::read(&a.file_path).unwrap(), b"a");
        assert_eq!(fs::read(&b.file_path).unwrap(), b"b");
    }

    #[test]
    fn test_add_document_from_existing_file() {
        let (env, repo, v) = setup();
        let outside = env.dir.path().join("photo.png");
        fs::write(&outside, b"png").unwrap();
        let mut new = bytes("ignored", b"");
        new.source = DocumentSource::File(outside.clone());

        let doc = repo.add_document(&v.id, new).unwrap();
        assert!(outside.exists());
        assert_eq!(doc.file_name(), "photo.png");
        assert_eq!(doc.mime_type, "image/png");
    }

    #[test]
    fn test_add_document_to_unknown_vehicle() {
        let (_env, repo, _v) = setup();
        assert!(matches!(
            repo.add_document("ghost", bytes("x.pdf", b"x")),
            Err(GloveboxError::VehicleNotFound(_))
        ));
    }

    #[test]
    fn test_update_document_keeps_file_fields() {
        let (_env, repo, v) = setup();
        let mut doc = repo.add_document(&v.id, bytes("invoice.pdf", b"%PDF")).unwrap();
        doc.name = "Brakes".to_string();
        doc.document_type = DocumentType::Maintenance;
        doc.file_size = 999;

        let updated = repo.update_document(doc.clone()).unwrap();
        assert_eq!(updated.name, "Brakes");
        assert_eq!(updated.document_type, DocumentType::Maintenance);
        assert_eq!(updated.file_size, 4);
        assert!(updated.modified_at >= doc.created_at);
    }

    #[test]
    fn test_delete_document_removes_file() {
        let (_env, repo, v) = setup();
        let doc = repo.add_document(&v.id, bytes("invoice.pdf", b"%PDF")).unwrap();
        repo.delete_document(doc.id).unwrap();

        assert!(!doc.file_path.exists());
        assert!(repo.get_vehicle(&v.id).unwrap().documents.is_empty());
        assert!(matches!(
            repo.delete_document(doc.id),
            Err(GloveboxError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_delete_document_never_leaves_the_vehicle_folder() {
        let (env, repo, v) = setup();
        let doc = repo.add_document(&v.id, bytes("invoice.pdf", b"%PDF")).unwrap();
        let victim = env.dir.path().join("victim.txt");
        fs::write(&victim, b"keep me").unwrap();

        let key = doc.id.to_string();
        let mut row = env.db.read(|c| records::fetch_file(c, &key)).unwrap().unwrap();
        row.relative_path = "../../../victim.txt".to_string();
        env.db.write(|tx| records::upsert_file(tx, &row)).unwrap();

        repo.delete_document(doc.id).unwrap();
        assert!(victim.exists());
        assert!(env.db.read(|c| records::fetch_file(c, &key)).unwrap().is_none());
    }

    #[test]
    fn test_unknown_document() {
        let (_env, repo, _v) = setup();
        assert!(matches!(
            repo.get_document(Uuid::new_v4()),
            Err(GloveboxError::DocumentNotFound(_))
        ));
    }
}
