//! Asynchronous key-value persistence.
//!
//! The store knows nothing about scenes: it holds opaque byte values under
//! string keys in one of two namespaces. [`FileStore`] keeps each namespace in
//! its own directory and tags the root with a schema version marker;
//! [`MemoryStore`] is a process-local stand-in used when persistence is not
//! wanted.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::{
    fs,
    sync::{Mutex, OnceCell, RwLock},
};
use tracing::{debug, info};

use crate::{
    config::{StoreConfig, StoreKind},
    StoreError,
};

/// Current on-disk schema generation.
pub const SCHEMA_VERSION: u32 = 2;

const VERSION_FILE: &str = "VERSION";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Logical partitions of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Opaque image payloads keyed by image key.
    Images,
    /// The profile registry, held under a single key.
    Profiles,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Images, Namespace::Profiles];

    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::Images => "images",
            Namespace::Profiles => "profiles",
        }
    }
}

/// Minimal async contract the slot registry persists through.
///
/// Writes to the same key are last-write-wins and never expose a partially
/// written value to readers.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Returns `Ok(None)` when the key has never been written.
    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<Vec<u8>>>;
}

impl<S: KeyValueStore> KeyValueStore for &S {
    async fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).put(namespace, key, value).await
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(namespace, key).await
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(['/', '\\'])
        && !key.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Process-local store. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(Namespace, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.entries
            .write()
            .await
            .insert((namespace, key.to_string()), value.to_vec());
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self
            .entries
            .read()
            .await
            .get(&(namespace, key.to_string()))
            .cloned())
    }
}

/// Directory-backed store.
///
/// Layout: `<root>/VERSION`, `<root>/images/<key>`, `<root>/profiles/<key>`.
/// The directories are created lazily on first access; opening an existing
/// root never removes anything.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    opened: OnceCell<()>,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            opened: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates missing namespaces and reconciles the schema marker. Safe to
    /// call repeatedly; a failed attempt is retried on the next access.
    pub async fn open(&self) -> StoreResult<()> {
        self.opened.get_or_try_init(|| self.initialise()).await?;
        Ok(())
    }

    async fn initialise(&self) -> StoreResult<()> {
        for namespace in Namespace::ALL {
            fs::create_dir_all(self.root.join(namespace.dir_name())).await?;
        }

        let marker = self.root.join(VERSION_FILE);
        match fs::read_to_string(&marker).await {
            Ok(raw) => {
                let found = raw.trim().parse::<u32>().map_err(|_| StoreError::Corrupt {
                    key: VERSION_FILE.to_string(),
                    reason: format!("unreadable schema marker `{}`", raw.trim()),
                })?;
                if found > SCHEMA_VERSION {
                    return Err(StoreError::UnsupportedSchema {
                        found,
                        supported: SCHEMA_VERSION,
                    });
                }
                if found < SCHEMA_VERSION {
                    self.migrate(found).await?;
                    self.write_atomic(&marker, SCHEMA_VERSION.to_string().as_bytes())
                        .await?;
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.write_atomic(&marker, SCHEMA_VERSION.to_string().as_bytes())
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        info!(root = %self.root.display(), version = SCHEMA_VERSION, "opened scene store");
        Ok(())
    }

    async fn migrate(&self, from: u32) -> StoreResult<()> {
        for version in from..SCHEMA_VERSION {
            // Namespace shapes are unchanged between generations so far.
            info!(from = version, to = version + 1, "upgrading store schema");
        }
        Ok(())
    }

    fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.root.join(namespace.dir_name()).join(key)
    }

    async fn write_atomic(&self, path: &Path, value: &[u8]) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&staging, value).await?;
        fs::rename(&staging, path).await?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    async fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.open().await?;
        let path = self.entry_path(namespace, key);
        self.write_atomic(&path, value).await?;
        debug!(namespace = namespace.dir_name(), key, bytes = value.len(), "stored value");
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        self.open().await?;
        match fs::read(self.entry_path(namespace, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Store selected from configuration at startup.
#[derive(Debug)]
pub enum StoreBackend {
    File(FileStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    pub fn from_config(config: &StoreConfig) -> Self {
        match config.backend {
            StoreKind::File => StoreBackend::File(FileStore::new(config.resolved_data_dir())),
            StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
        }
    }
}

impl KeyValueStore for StoreBackend {
    async fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> StoreResult<()> {
        match self {
            StoreBackend::File(store) => store.put(namespace, key, value).await,
            StoreBackend::Memory(store) => store.put(namespace, key, value).await,
        }
    }

    async fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self {
            StoreBackend::File(store) => store.get(namespace, key).await,
            StoreBackend::Memory(store) => store.get(namespace, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_keeps_namespaces_apart() {
        let store = MemoryStore::new();
        store.put(Namespace::Images, "k", b"image").await.unwrap();
        store.put(Namespace::Profiles, "k", b"profile").await.unwrap();

        assert_eq!(
            store.get(Namespace::Images, "k").await.unwrap().as_deref(),
            Some(&b"image"[..])
        );
        assert_eq!(
            store.get(Namespace::Profiles, "k").await.unwrap().as_deref(),
            Some(&b"profile"[..])
        );
        assert!(store.get(Namespace::Images, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        store.put(Namespace::Images, "k", b"first").await.unwrap();
        store.put(Namespace::Images, "k", b"second").await.unwrap();
        assert_eq!(
            store.get(Namespace::Images, "k").await.unwrap().as_deref(),
            Some(&b"second"[..])
        );
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let store = MemoryStore::new();
        for key in ["", "../escape", "a/b", ".hidden"] {
            let err = store.put(Namespace::Images, key, b"x").await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn file_store_creates_layout_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        let store = FileStore::new(&root);
        assert!(!root.exists());

        assert!(store.get(Namespace::Profiles, "profiles").await.unwrap().is_none());
        assert!(root.join("images").is_dir());
        assert!(root.join("profiles").is_dir());
        assert_eq!(
            std::fs::read_to_string(root.join(VERSION_FILE)).unwrap(),
            SCHEMA_VERSION.to_string()
        );
    }

    #[tokio::test]
    async fn reopening_keeps_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path());
            store.put(Namespace::Images, "img_slot_1", b"pixels").await.unwrap();
        }

        let store = FileStore::new(dir.path());
        store.open().await.unwrap();
        store.open().await.unwrap();
        assert_eq!(
            store.get(Namespace::Images, "img_slot_1").await.unwrap().as_deref(),
            Some(&b"pixels"[..])
        );
    }

    #[tokio::test]
    async fn writes_leave_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.put(Namespace::Profiles, "profiles", b"{}").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("profiles"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["profiles".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_key_stay_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let first = vec![0xAA_u8; 1 << 20];
        let second = vec![0x55_u8; 1 << 20];

        let (a, b) = tokio::join!(
            store.put(Namespace::Images, "img_slot_1", &first),
            store.put(Namespace::Images, "img_slot_1", &second)
        );
        a.unwrap();
        b.unwrap();

        let stored = store.get(Namespace::Images, "img_slot_1").await.unwrap().unwrap();
        assert!(stored == first || stored == second);
    }

    #[tokio::test]
    async fn upgrades_older_schema_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("images").join("img_slot_2"), b"old").unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "1").unwrap();

        let store = FileStore::new(dir.path());
        assert_eq!(
            store.get(Namespace::Images, "img_slot_2").await.unwrap().as_deref(),
            Some(&b"old"[..])
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(VERSION_FILE)).unwrap(),
            SCHEMA_VERSION.to_string()
        );
    }

    #[tokio::test]
    async fn refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "99").unwrap();

        let store = FileStore::new(dir.path());
        let err = store.open().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedSchema { found: 99, supported: SCHEMA_VERSION }
        ));
    }

    #[tokio::test]
    async fn backend_follows_config() {
        let config = StoreConfig {
            backend: StoreKind::Memory,
            data_dir: None,
        };
        let store = StoreBackend::from_config(&config);
        assert!(matches!(store, StoreBackend::Memory(_)));

        store.put(Namespace::Images, "k", b"v").await.unwrap();
        assert!(store.get(Namespace::Images, "k").await.unwrap().is_some());
    }
}
