use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::{DeliveryError, RenderError};
use crate::models::DocumentId;

const PARTIAL_SUFFIX: &str = ".partial";

/// Directory of rendered invoices, one file per [`DocumentId`].
///
/// Renders land in a `.partial` file and only appear under their final name
/// once [`DocumentStore::commit`] succeeds, so readers never observe a
/// half-written document.
pub struct DocumentStore {
    root: PathBuf,
    latest: RwLock<Option<DocumentId>>,
}

/// A reserved slot for a render in progress.
///
/// Dropping it without committing removes whatever the renderer left behind.
pub struct PendingDocument {
    id: DocumentId,
    partial_path: PathBuf,
    committed: bool,
}

impl PendingDocument {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.partial_path
    }
}

impl Drop for PendingDocument {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}

impl DocumentStore {
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            latest: RwLock::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reserve(&self) -> PendingDocument {
        let id = DocumentId::new();
        let partial_path = self
            .root
            .join(format!("{}{}", id.file_name(), PARTIAL_SUFFIX));

        PendingDocument {
            id,
            partial_path,
            committed: false,
        }
    }

    pub fn path_of(&self, id: DocumentId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Publishes a finished render under its final name.
    pub async fn commit(&self, mut pending: PendingDocument) -> Result<DocumentId, RenderError> {
        let size = match tokio::fs::metadata(&pending.partial_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RenderError::Engine(
                    "renderer finished without producing a document".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(RenderError::Engine("renderer produced an empty document".to_string()));
        }

        tokio::fs::rename(&pending.partial_path, self.path_of(pending.id)).await?;
        pending.committed = true;

        *self.latest.write().await = Some(pending.id);
        Ok(pending.id)
    }

    pub async fn read(&self, id: DocumentId) -> Result<Vec<u8>, DeliveryError> {
        match tokio::fs::read(self.path_of(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DeliveryError::NotFound(format!("no document with id {}", id)))
            }
            Err(e) => Err(RenderError::Io(e).into()),
        }
    }

    /// The most recently committed document.
    pub async fn read_latest(&self) -> Result<(DocumentId, Vec<u8>), DeliveryError> {
        let latest = *self.latest.read().await;
        let id = latest.ok_or_else(|| {
            DeliveryError::NotFound("no document has been rendered yet".to_string())
        })?;
        let bytes = self.read(id).await?;
        Ok((id, bytes))
    }

    /// Deletes documents and leftover render scratch files older than `ttl`.
    pub async fn prune_older_than(&self, ttl: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name
                .strip_suffix(PARTIAL_SUFFIX)
                .or_else(|| name.strip_suffix(".html"))
                .unwrap_or(name)
                .strip_suffix(".pdf")
            else {
                continue;
            };
            if Uuid::parse_str(stem).is_err() {
                continue;
            }

            // Gone already: committed or pruned since the listing
            match file_age(&entry.path(), now).await? {
                Some(age) if age >= ttl => {}
                _ => continue,
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        if removed > 0 {
            let mut latest = self.latest.write().await;
            if let Some(id) = *latest {
                if tokio::fs::metadata(self.path_of(id)).await.is_err() {
                    *latest = None;
                }
            }
        }

        Ok(removed)
    }
}

async fn file_age(path: &Path, now: SystemTime) -> io::Result<Option<Duration>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(now.duration_since(meta.modified()?).unwrap_or_default())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (DocumentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn nothing_to_fetch_before_first_commit() {
        let (store, _dir) = store().await;
        assert!(matches!(
            store.read_latest().await,
            Err(DeliveryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn committed_document_is_readable_by_id_and_as_latest() {
        let (store, _dir) = store().await;
        let pending = store.reserve();
        tokio::fs::write(pending.path(), b"%PDF-1.4 one").await.unwrap();

        let id = store.commit(pending).await.unwrap();

        assert_eq!(store.read(id).await.unwrap(), b"%PDF-1.4 one");
        let (latest_id, bytes) = store.read_latest().await.unwrap();
        assert_eq!(latest_id, id);
        assert_eq!(bytes, b"%PDF-1.4 one");
    }

    #[tokio::test]
    async fn dropped_reservation_cleans_up_partial_file() {
        let (store, dir) = store().await;
        let pending = store.reserve();
        let partial = pending.path().to_path_buf();
        tokio::fs::write(&partial, b"half").await.unwrap();

        drop(pending);

        assert!(!partial.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_render_is_not_committed() {
        let (store, dir) = store().await;
        let pending = store.reserve();
        tokio::fs::write(pending.path(), b"").await.unwrap();

        assert!(matches!(
            store.commit(pending).await,
            Err(RenderError::Engine(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(store.read_latest().await.is_err());
    }

    #[tokio::test]
    async fn missing_output_is_an_engine_error() {
        let (store, _dir) = store().await;
        let pending = store.reserve();
        assert!(matches!(
            store.commit(pending).await,
            Err(RenderError::Engine(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (store, _dir) = store().await;
        assert!(matches!(
            store.read(DocumentId::new()).await,
            Err(DeliveryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn prune_respects_ttl_and_ignores_foreign_files() {
        let (store, dir) = store().await;
        let pending = store.reserve();
        tokio::fs::write(pending.path(), b"%PDF").await.unwrap();
        let id = store.commit(pending).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        assert_eq!(store.prune_older_than(Duration::from_secs(3600)).await.unwrap(), 0);
        assert!(store.read(id).await.is_ok());

        assert_eq!(store.prune_older_than(Duration::ZERO).await.unwrap(), 1);
        assert!(matches!(store.read(id).await, Err(DeliveryError::NotFound(_))));
        assert!(matches!(store.read_latest().await, Err(DeliveryError::NotFound(_))));
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn vanished_entry_has_no_age() {
        let (store, _dir) = store().await;
        let pending = store.reserve();

        assert_eq!(file_age(pending.path(), SystemTime::now()).await.unwrap(), None);
    }
}
