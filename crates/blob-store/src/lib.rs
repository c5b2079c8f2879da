//! Content storage for uploaded documents. Blobs are addressed by a
//! generated [`FileId`]; the disk store keeps bytes under a data directory
//! with a versioned JSON index alongside them, so the format can migrate
//! without guessing.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("no blob with id {0}")]
    NotFound(FileId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque identifier a stored blob is addressed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub id: FileId,
    /// Original filename, kept for display only.
    pub name: String,
    pub len: u64,
}

pub trait BlobStore {
    fn put(&mut self, name: &str, bytes: &[u8]) -> StoreResult<FileId>;
    fn get(&self, id: FileId) -> StoreResult<Vec<u8>>;
    fn remove(&mut self, id: FileId) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<BlobMeta>>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: BTreeMap<FileId, (BlobMeta, Vec<u8>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn put(&mut self, name: &str, bytes: &[u8]) -> StoreResult<FileId> {
        let id = FileId::generate();
        let meta = BlobMeta { id, name: to_owned_name(name), len: bytes.len() as u64 };
        self.blobs.insert(id, (meta, bytes.to_vec()));
        Ok(id)
    }

    fn get(&self, id: FileId) -> StoreResult<Vec<u8>> {
        self.blobs
            .get(&id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(StoreError::NotFound(id))
    }

    fn remove(&mut self, id: FileId) -> StoreResult<()> {
        self.blobs.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> StoreResult<Vec<BlobMeta>> {
        Ok(self.blobs.values().map(|(meta, _)| meta.clone()).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEnvelope {
    version: u32,
    entries: BTreeMap<FileId, BlobMeta>,
}

/// Store backed by the platform data directory (or any root).
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn from_default_project() -> StoreResult<Self> {
        let dirs =
            ProjectDirs::from("dev", "FieldView", "FieldView").ok_or(StoreError::NoDataDirectory)?;
        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    fn blob_path(&self, id: FileId) -> PathBuf {
        self.root.join("blobs").join(id.to_string())
    }

    fn load_index(&self) -> StoreResult<BTreeMap<FileId, BlobMeta>> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let bytes = fs::read(path)?;
        let envelope: IndexEnvelope = serde_json::from_slice(&bytes)?;
        Ok(envelope.entries)
    }

    fn save_index(&self, entries: &BTreeMap<FileId, BlobMeta>) -> StoreResult<()> {
        fs::create_dir_all(&self.root)?;
        let envelope =
            IndexEnvelope { version: INDEX_SCHEMA_VERSION, entries: entries.clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.index_path(), bytes)?;
        Ok(())
    }
}

impl BlobStore for DiskStore {
    fn put(&mut self, name: &str, bytes: &[u8]) -> StoreResult<FileId> {
        let id = FileId::generate();
        let mut entries = self.load_index()?;

        fs::create_dir_all(self.root.join("blobs"))?;
        fs::write(self.blob_path(id), bytes)?;

        entries.insert(
            id,
            BlobMeta { id, name: to_owned_name(name), len: bytes.len() as u64 },
        );
        self.save_index(&entries)?;

        tracing::debug!(%id, len = bytes.len(), "blob stored");
        Ok(id)
    }

    fn get(&self, id: FileId) -> StoreResult<Vec<u8>> {
        let entries = self.load_index()?;
        if !entries.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        Ok(fs::read(self.blob_path(id))?)
    }

    fn remove(&mut self, id: FileId) -> StoreResult<()> {
        let mut entries = self.load_index()?;
        if entries.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }

        let path = self.blob_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        self.save_index(&entries)
    }

    fn list(&self) -> StoreResult<Vec<BlobMeta>> {
        Ok(self.load_index()?.into_values().collect())
    }
}

fn to_owned_name(name: &str) -> String {
    if name.is_empty() {
        "untitled".to_owned()
    } else {
        name.to_owned()
    }
}
