//! Image attachments: the object store seam and the entry-level operations.
//!
//! Image bytes live in an [`ImageStore`]; the `entry_images` table only holds
//! the store-relative path. Paths have the shape
//! `<entry-id>/<unix-millis>-<8 hex>.<ext>`.

use crate::core::knowledge_base::{millis_to_utc, new_operation_id, now_millis};
use crate::{EntryImage, KnowledgeBase, Operation, OryokiError, Result, Session};
use rusqlite::OptionalExtension;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const MAX_IMAGES_PER_ENTRY: usize = 5;

/// Object storage for image bytes, keyed by relative path.
pub trait ImageStore: Send {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&self, path: &str) -> Result<()>;
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// An [`ImageStore`] backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirImageStore {
    root: PathBuf,
}

impl DirImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty() || relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(OryokiError::ImageStore(format!("invalid image path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageStore for DirImageStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)
            .map_err(|e| OryokiError::ImageStore(format!("failed to write {path}: {e}")))
    }

    fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OryokiError::ImageStore(format!("failed to remove {path}: {e}"))),
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        fs::read(&target).map_err(|e| OryokiError::ImageStore(format!("failed to read {path}: {e}")))
    }
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// The lowercase file extension, if the name guesses to an `image/*` type.
    pub fn image_extension(&self) -> Result<String> {
        let is_image = mime_guess::from_path(&self.file_name)
            .iter()
            .any(|mime| mime.type_() == mime_guess::mime::IMAGE);
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        match extension {
            Some(ext) if is_image => Ok(ext),
            _ => Err(OryokiError::ValidationFailed(format!(
                "{} is not an image file",
                self.file_name
            ))),
        }
    }
}

fn storage_path(entry_id: &str, millis: i64, extension: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{entry_id}/{millis}-{}.{extension}", &suffix[..8])
}

fn map_image_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn image_from_row((id, entry_id, file_path, created_at): (String, String, String, i64)) -> Result<EntryImage> {
    Ok(EntryImage {
        id,
        entry_id,
        file_path,
        created_at: millis_to_utc(created_at)?,
    })
}

impl KnowledgeBase {
    /// Returns the images of `entry_id`, oldest first.
    pub fn list_images(&self, entry_id: &str) -> Result<Vec<EntryImage>> {
        self.query_images(entry_id)
            .inspect_err(|e| log::error!("failed to load images of entry {entry_id}: {e}"))
    }

    pub(super) fn query_images(&self, entry_id: &str) -> Result<Vec<EntryImage>> {
        let mut stmt = self.storage.connection().prepare(
            "SELECT id, entry_id, file_path, created_at FROM entry_images
             WHERE entry_id = ? ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map([entry_id], map_image_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(image_from_row).collect()
    }

    /// Attaches `uploads` to `entry_id`.
    ///
    /// Either every upload is stored and recorded, or none is: when a store
    /// write or row insert fails, the objects already written by this call
    /// are removed again and the inserted rows roll back.
    pub fn add_images(
        &mut self,
        session: &Session,
        entry_id: &str,
        uploads: &[ImageUpload],
    ) -> Result<Vec<EntryImage>> {
        self.store_images(session, entry_id, uploads)
            .inspect_err(|e| log::error!("failed to attach images to entry {entry_id}: {e}"))
    }

    fn store_images(&mut self, session: &Session, entry_id: &str, uploads: &[ImageUpload]) -> Result<Vec<EntryImage>> {
        let extensions = uploads
            .iter()
            .map(ImageUpload::image_extension)
            .collect::<Result<Vec<_>>>()?;

        let tx = self.storage.connection_mut().transaction()?;
        let existing: i64 = tx
            .query_row("SELECT COUNT(*) FROM entries WHERE id = ?", [entry_id], |row| row.get(0))?;
        if existing == 0 {
            return Err(OryokiError::EntryNotFound(entry_id.to_string()));
        }
        let attached: i64 = tx.query_row(
            "SELECT COUNT(*) FROM entry_images WHERE entry_id = ?",
            [entry_id],
            |row| row.get(0),
        )?;
        if attached as usize + uploads.len() > MAX_IMAGES_PER_ENTRY {
            return Err(OryokiError::ValidationFailed(format!(
                "Maximum {MAX_IMAGES_PER_ENTRY} images allowed"
            )));
        }

        let now = now_millis();
        let mut written: Vec<String> = Vec::new();
        let mut added = Vec::new();

        for (upload, ext) in uploads.iter().zip(&extensions) {
            let path = storage_path(entry_id, now, ext);
            let image_id = uuid::Uuid::new_v4().to_string();

            let stored = self.images.put(&path, &upload.bytes).and_then(|()| {
                written.push(path.clone());
                tx.execute(
                    "INSERT INTO entry_images (id, entry_id, file_path, created_at) VALUES (?, ?, ?, ?)",
                    rusqlite::params![image_id, entry_id, path, now],
                )?;
                self.operation_log.log(
                    &tx,
                    &Operation::AddImage {
                        operation_id: new_operation_id(),
                        timestamp: now,
                        user_id: Some(session.user_id().to_string()),
                        entry_id: entry_id.to_string(),
                        image_id: image_id.clone(),
                        file_path: path.clone(),
                    },
                )
            });

            if let Err(e) = stored {
                log::warn!("upload of {} failed, discarding {} stored file(s)", upload.file_name, written.len());
                discard(&*self.images, &written);
                return Err(e);
            }
            added.push(EntryImage {
                id: image_id,
                entry_id: entry_id.to_string(),
                file_path: path,
                created_at: millis_to_utc(now)?,
            });
        }

        let committed = self
            .operation_log
            .purge_if_needed(&tx)
            .and_then(|()| tx.commit().map_err(OryokiError::from));
        if let Err(e) = committed {
            discard(&*self.images, &written);
            return Err(e);
        }

        log::info!("attached {} image(s) to entry {entry_id}", added.len());
        Ok(added)
    }

    /// Removes one image: the stored object first, then its row.
    pub fn remove_image(&mut self, session: &Session, image_id: &str) -> Result<()> {
        self.delete_image(session, image_id)
            .inspect_err(|e| log::error!("failed to remove image {image_id}: {e}"))
    }

    fn delete_image(&mut self, session: &Session, image_id: &str) -> Result<()> {
        let file_path: String = self
            .storage
            .connection()
            .query_row("SELECT file_path FROM entry_images WHERE id = ?", [image_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| OryokiError::ImageNotFound(image_id.to_string()))?;

        self.images.remove(&file_path)?;

        let tx = self.storage.connection_mut().transaction()?;
        tx.execute("DELETE FROM entry_images WHERE id = ?", [image_id])?;
        self.operation_log.log(
            &tx,
            &Operation::RemoveImage {
                operation_id: new_operation_id(),
                timestamp: now_millis(),
                user_id: Some(session.user_id().to_string()),
                image_id: image_id.to_string(),
                file_path,
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Returns the bytes of one stored image.
    pub fn read_image(&self, image_id: &str) -> Result<Vec<u8>> {
        self.load_image(image_id)
            .inspect_err(|e| log::error!("failed to read image {image_id}: {e}"))
    }

    fn load_image(&self, image_id: &str) -> Result<Vec<u8>> {
        let file_path: String = self
            .storage
            .connection()
            .query_row("SELECT file_path FROM entry_images WHERE id = ?", [image_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| OryokiError::ImageNotFound(image_id.to_string()))?;
        self.images.read(&file_path)
    }
}

/// Best-effort removal of objects written before a failure.
fn discard(store: &dyn ImageStore, paths: &[String]) {
    for path in paths {
        if let Err(e) = store.remove(path) {
            log::warn!("could not discard uploaded image {path}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_capture;
    use crate::{EntryDetails, NewEntry, Role};
    use std::sync::{Arc, Mutex};
    use tempfile::{NamedTempFile, TempDir};

    fn upload(name: &str) -> ImageUpload {
        ImageUpload::new(name, vec![0x89, b'P', b'N', b'G'])
    }

    fn setup_with(store: impl ImageStore + 'static) -> (KnowledgeBase, Session, String, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let mut kb = KnowledgeBase::create(temp.path(), store).unwrap();
        kb.create_user("alice", Role::User).unwrap();
        let session = Session::begin(&mut kb, "alice").unwrap();
        let entry_id = kb
            .create_entry(
                &session,
                NewEntry::draft(
                    "Reset password",
                    EntryDetails::Process {
                        description: "Use the portal".to_string(),
                    },
                ),
            )
            .unwrap();
        (kb, session, entry_id, temp)
    }

    /// Fails every `put` after the first `allow` succeed, and records what it holds.
    struct FlakyStore {
        allow: usize,
        held: Arc<Mutex<Vec<String>>>,
    }

    impl ImageStore for FlakyStore {
        fn put(&self, path: &str, _bytes: &[u8]) -> Result<()> {
            let mut held = self.held.lock().unwrap();
            if held.len() >= self.allow {
                return Err(OryokiError::ImageStore("quota exceeded".to_string()));
            }
            held.push(path.to_string());
            Ok(())
        }

        fn remove(&self, path: &str) -> Result<()> {
            self.held.lock().unwrap().retain(|p| p != path);
            Ok(())
        }

        fn read(&self, path: &str) -> Result<Vec<u8>> {
            Err(OryokiError::ImageStore(format!("no bytes for {path}")))
        }
    }

    #[test]
    fn test_image_extension_accepts_images_only() {
        assert_eq!(upload("screen.PNG").image_extension().unwrap(), "png");
        assert_eq!(upload("photo.jpeg").image_extension().unwrap(), "jpeg");
        assert!(upload("notes.txt").image_extension().is_err());
        assert!(upload("no_extension").image_extension().is_err());
    }

    #[test]
    fn test_dir_store_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let store = DirImageStore::new(dir.path());
        assert!(store.put("../outside.png", b"x").is_err());
        assert!(store.put("/abs.png", b"x").is_err());
        store.put("e1/1.png", b"x").unwrap();
        assert_eq!(store.read("e1/1.png").unwrap(), b"x");
        store.remove("e1/1.png").unwrap();
        store.remove("e1/1.png").unwrap();
    }

    #[test]
    fn test_add_list_read_and_remove_images() {
        let dir = TempDir::new().unwrap();
        let (mut kb, session, entry_id, _temp) = setup_with(DirImageStore::new(dir.path()));

        let added = kb
            .add_images(&session, &entry_id, &[upload("a.png"), upload("b.gif")])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_ne!(added[0].file_path, added[1].file_path);
        assert!(added[0].file_path.starts_with(&format!("{entry_id}/")));
        assert!(added[1].file_path.ends_with(".gif"));

        assert_eq!(kb.list_images(&entry_id).unwrap().len(), 2);
        assert_eq!(kb.get_entry(&entry_id).unwrap().images.len(), 2);
        assert_eq!(kb.read_image(&added[0].id).unwrap(), vec![0x89, b'P', b'N', b'G']);

        kb.remove_image(&session, &added[0].id).unwrap();
        assert!(!dir.path().join(&added[0].file_path).exists());
        assert_eq!(kb.list_images(&entry_id).unwrap().len(), 1);
        assert!(matches!(
            kb.remove_image(&session, &added[0].id),
            Err(OryokiError::ImageNotFound(_))
        ));
    }

    #[test]
    fn test_image_limit_is_enforced() {
        let dir = TempDir::new().unwrap();
        let (mut kb, session, entry_id, _temp) = setup_with(DirImageStore::new(dir.path()));

        let four: Vec<_> = (0..4).map(|i| upload(&format!("{i}.png"))).collect();
        kb.add_images(&session, &entry_id, &four).unwrap();

        let result = kb.add_images(&session, &entry_id, &[upload("x.png"), upload("y.png")]);
        assert!(matches!(result, Err(OryokiError::ValidationFailed(_))));
        assert_eq!(kb.list_images(&entry_id).unwrap().len(), 4);

        kb.add_images(&session, &entry_id, &[upload("x.png")]).unwrap();
        assert_eq!(kb.list_images(&entry_id).unwrap().len(), MAX_IMAGES_PER_ENTRY);
    }

    #[test]
    fn test_non_image_rejected_before_any_write() {
        let dir = TempDir::new().unwrap();
        let (mut kb, session, entry_id, _temp) = setup_with(DirImageStore::new(dir.path()));

        let result = kb.add_images(&session, &entry_id, &[upload("a.png"), upload("readme.md")]);
        assert!(matches!(result, Err(OryokiError::ValidationFailed(_))));
        assert!(!dir.path().join(&entry_id).exists());
    }

    #[test]
    fn test_failed_upload_discards_earlier_files() {
        let held = Arc::new(Mutex::new(Vec::new()));
        let store = FlakyStore {
            allow: 2,
            held: Arc::clone(&held),
        };
        let (mut kb, session, entry_id, _temp) = setup_with(store);

        let result = kb.add_images(
            &session,
            &entry_id,
            &[upload("1.png"), upload("2.png"), upload("3.png")],
        );

        assert!(matches!(result, Err(OryokiError::ImageStore(_))));
        assert!(held.lock().unwrap().is_empty());
        assert!(kb.list_images(&entry_id).unwrap().is_empty());
    }

    #[test]
    fn test_add_images_to_missing_entry() {
        let dir = TempDir::new().unwrap();
        let (mut kb, session, _entry_id, _temp) = setup_with(DirImageStore::new(dir.path()));
        assert!(matches!(
            kb.add_images(&session, "missing", &[upload("a.png")]),
            Err(OryokiError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_image_failures_are_logged() {
        let held = Arc::new(Mutex::new(Vec::new()));
        let store = FlakyStore {
            allow: 1,
            held: Arc::clone(&held),
        };
        let (mut kb, session, entry_id, _temp) = setup_with(store);
        log_capture::start();

        assert!(kb.add_images(&session, &entry_id, &[upload("a.png"), upload("b.png")]).is_err());
        assert!(matches!(
            kb.remove_image(&session, "missing"),
            Err(OryokiError::ImageNotFound(_))
        ));

        let errors = log_capture::errors();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].starts_with(&format!("failed to attach images to entry {entry_id}")));
        assert!(errors[1].starts_with("failed to remove image missing"));
    }
}
