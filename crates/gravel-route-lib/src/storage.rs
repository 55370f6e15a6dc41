//! Local persistence for saved routes.
//!
//! Routes are stored as JSON strings under string keys in a [`StorageBackend`]:
//!
//! - [`FileStorage`] keeps every entry in one pretty-printed JSON object on disk, ordered
//!   by key, and rewrites it through a temporary file after each mutation.
//! - [`MemoryStorage`] keeps the entries in-process, for tests and sessions that should
//!   not touch the disk.
//!
//! On top of it, [`RouteLibrary`] keeps named [`SavedRoute`]s plus a single autosave slot.
//! Using a library before a backend is attached is an error rather than a silent no-op.

use crate::RouteEngine;
use crate::history::RouteSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const ROUTE_KEY_PREFIX: &str = "route:";
const AUTOSAVE_KEY: &str = "autosave";
const STORE_FILE_NAME: &str = "routes.json";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Route store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Route store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Route store lock poisoned")]
    Poisoned,

    #[error("Storage backend not initialized")]
    NotInitialized,

    #[error("Invalid route name: {0:?}")]
    InvalidName(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key/value store for serialized routes.
///
/// Keys and values are UTF-8 strings; [`RouteLibrary`] owns the key layout.
pub trait StorageBackend: Send + Sync {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// `Ok(None)` when the key is missing
    fn get_string(&self, key: &str) -> StorageResult<Option<String>>;

    /// No-op when the key is missing
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All stored keys in ascending order
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Entries shared by both backends, ordered so the store file diffs cleanly
#[derive(Default)]
struct Entries(Mutex<BTreeMap<String, String>>);

impl Entries {
    fn lock(&self) -> StorageResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.0.lock().map_err(|_| StorageError::Poisoned)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryStorage {
    entries: Entries,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        self.entries.get(key)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.entries.keys()
    }
}

/// Route store backed by a single JSON file.
///
/// The file is read once on open. Every mutation rewrites it while the lock is held,
/// so a crash mid-write leaves the previous file in place.
pub struct FileStorage {
    path: PathBuf,
    entries: Entries,
}

impl FileStorage {
    /// Per-user location of the route store:
    /// `%APPDATA%/GravelRoute` on Windows, `$HOME/.config/gravel-route` elsewhere,
    /// or the working directory when neither variable is set.
    pub fn default_storage_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("GravelRoute").join(STORE_FILE_NAME);
        }

        match std::env::var("HOME") {
            Ok(home) => Path::new(&home)
                .join(".config")
                .join("gravel-route")
                .join(STORE_FILE_NAME),
            Err(_) => PathBuf::from(format!("gravel-route-{}", STORE_FILE_NAME)),
        }
    }

    /// Open (or create) the store. `None` uses [`Self::default_storage_path`].
    pub fn new_with_path(path: Option<PathBuf>) -> StorageResult<Self> {
        let path = path.unwrap_or_else(Self::default_storage_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let map: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Opened route store at {} ({} entries)",
            path.display(),
            map.len()
        );

        let storage = FileStorage {
            path,
            entries: Entries(Mutex::new(map)),
        };
        storage.persist(&*storage.entries.lock()?)?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(map)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut map = self.entries.lock()?;
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        self.entries.get(key)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut map = self.entries.lock()?;
        if map.remove(key).is_some() {
            self.persist(&map)?;
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        self.entries.keys()
    }
}

/// A named route as persisted by [`RouteLibrary`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedRoute {
    pub name: String,
    pub snapshot: RouteSnapshot,
    /// Total path length at save time, in meters
    pub distance_meters: f64,
    pub saved_at_unix: u64,
}

impl SavedRoute {
    fn new(name: &str, snapshot: &RouteSnapshot) -> Self {
        let mut engine = RouteEngine::new();
        engine.restore(snapshot);

        let saved_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            snapshot: engine.snapshot(),
            distance_meters: engine.total_distance(),
            saved_at_unix,
        }
    }
}

/// Named route storage on top of a [`StorageBackend`]
#[derive(Default)]
pub struct RouteLibrary {
    backend: Option<Box<dyn StorageBackend>>,
}

impl RouteLibrary {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A library with no backend; every operation fails with [`StorageError::NotInitialized`]
    pub fn uninitialized() -> Self {
        Self { backend: None }
    }

    /// Open the default file-backed library
    pub fn open_default() -> StorageResult<Self> {
        Ok(Self::new(Box::new(FileStorage::new_with_path(None)?)))
    }

    /// Attach a backend after construction
    pub fn attach(&mut self, backend: Box<dyn StorageBackend>) {
        self.backend = Some(backend);
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> StorageResult<&dyn StorageBackend> {
        self.backend.as_deref().ok_or(StorageError::NotInitialized)
    }

    fn put(&self, key: &str, saved: &SavedRoute) -> StorageResult<()> {
        self.backend()?.set_string(key, &serde_json::to_string(saved)?)
    }

    fn get(&self, key: &str) -> StorageResult<Option<SavedRoute>> {
        match self.backend()?.get_string(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn route_key(name: &str) -> StorageResult<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(format!("{}{}", ROUTE_KEY_PREFIX, trimmed))
    }

    /// Save (or overwrite) a named route
    pub fn save(&self, name: &str, snapshot: &RouteSnapshot) -> StorageResult<SavedRoute> {
        let key = Self::route_key(name)?;
        let saved = SavedRoute::new(name.trim(), snapshot);
        self.put(&key, &saved)?;
        tracing::info!(
            "Saved route {:?} ({} points)",
            saved.name,
            saved.snapshot.points.len()
        );
        Ok(saved)
    }

    pub fn load(&self, name: &str) -> StorageResult<Option<SavedRoute>> {
        self.get(&Self::route_key(name)?)
    }

    /// Delete a named route. Returns whether it existed.
    pub fn delete(&self, name: &str) -> StorageResult<bool> {
        let backend = self.backend()?;
        let key = Self::route_key(name)?;
        let existed = backend.get_string(&key)?.is_some();
        backend.remove(&key)?;
        if existed {
            tracing::info!("Deleted route {:?}", name.trim());
        }
        Ok(existed)
    }

    /// Names of all saved routes, sorted
    pub fn list(&self) -> StorageResult<Vec<String>> {
        let backend = self.backend()?;
        Ok(backend
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(ROUTE_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    /// Overwrite the single autosave slot
    pub fn autosave(&self, snapshot: &RouteSnapshot) -> StorageResult<()> {
        self.put(AUTOSAVE_KEY, &SavedRoute::new(AUTOSAVE_KEY, snapshot))?;
        tracing::debug!("Autosaved route ({} points)", snapshot.points.len());
        Ok(())
    }

    pub fn load_autosave(&self) -> StorageResult<Option<SavedRoute>> {
        self.get(AUTOSAVE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoutePoint;

    fn loop_snapshot() -> RouteSnapshot {
        RouteSnapshot {
            points: vec![
                RoutePoint::new(59.0, 18.0),
                RoutePoint::new(59.001, 18.0),
                RoutePoint::new(59.002, 18.0),
            ],
            loop_closed: true,
        }
    }

    fn memory_library() -> RouteLibrary {
        RouteLibrary::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn test_uninitialized_library_errors() {
        let library = RouteLibrary::uninitialized();
        assert!(!library.is_initialized());
        assert!(matches!(
            library.save("a", &loop_snapshot()),
            Err(StorageError::NotInitialized)
        ));
        assert!(matches!(library.list(), Err(StorageError::NotInitialized)));
        assert!(matches!(
            library.load_autosave(),
            Err(StorageError::NotInitialized)
        ));
    }

    #[test]
    fn test_attach_initializes() {
        let mut library = RouteLibrary::default();
        library.attach(Box::new(MemoryStorage::new()));
        assert!(library.is_initialized());
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_list_delete() {
        let library = memory_library();
        let saved = library.save(" Morning loop ", &loop_snapshot()).unwrap();
        assert_eq!(saved.name, "Morning loop");
        assert!((saved.distance_meters - 444.8).abs() < 0.5);
        library.save("Another", &RouteSnapshot::default()).unwrap();

        assert_eq!(library.list().unwrap(), vec!["Another", "Morning loop"]);

        let loaded = library.load("Morning loop").unwrap().unwrap();
        assert_eq!(loaded.snapshot, loop_snapshot());
        assert!(library.load("missing").unwrap().is_none());

        assert!(library.delete("Another").unwrap());
        assert!(!library.delete("Another").unwrap());
        assert_eq!(library.list().unwrap(), vec!["Morning loop"]);
    }

    #[test]
    fn test_invalid_name() {
        let library = memory_library();
        assert!(matches!(
            library.save("   ", &loop_snapshot()),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_saved_snapshot_clamps_invalid_loop() {
        let library = memory_library();
        let crafted = RouteSnapshot {
            points: vec![RoutePoint::new(0.0, 0.0), RoutePoint::new(0.0, 0.1)],
            loop_closed: true,
        };
        let saved = library.save("crafted", &crafted).unwrap();
        assert!(!saved.snapshot.loop_closed);
    }

    #[test]
    fn test_autosave_overwrites() {
        let library = memory_library();
        assert!(library.load_autosave().unwrap().is_none());

        library.autosave(&RouteSnapshot::default()).unwrap();
        library.autosave(&loop_snapshot()).unwrap();

        let autosaved = library.load_autosave().unwrap().unwrap();
        assert_eq!(autosaved.snapshot, loop_snapshot());
        // The autosave slot is not a named route
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("routes.json");

        {
            let storage = FileStorage::new_with_path(Some(path.clone())).unwrap();
            let library = RouteLibrary::new(Box::new(storage));
            library.save("Gravel", &loop_snapshot()).unwrap();
        }

        let storage = FileStorage::new_with_path(Some(path.clone())).unwrap();
        assert_eq!(storage.path(), path.as_path());
        let library = RouteLibrary::new(Box::new(storage));
        assert_eq!(library.list().unwrap(), vec!["Gravel"]);
        assert_eq!(
            library.load("Gravel").unwrap().unwrap().snapshot,
            loop_snapshot()
        );
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            FileStorage::new_with_path(Some(path)),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn test_corrupt_entry_is_json_error() {
        let storage = MemoryStorage::new();
        storage.set_string("route:Broken", "not json").unwrap();
        let library = RouteLibrary::new(Box::new(storage));

        assert_eq!(library.list().unwrap(), vec!["Broken"]);
        assert!(matches!(library.load("Broken"), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_file_storage_writes_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let storage = FileStorage::new_with_path(Some(path.clone())).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");

        storage.set_string("b", "2").unwrap();
        storage.set_string("a", "1").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["a", "b"]);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
        assert!(!path.with_extension("json.tmp").exists());

        storage.remove("a").unwrap();
        storage.remove("missing").unwrap();
        let reopened = FileStorage::new_with_path(Some(path)).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b"]);
    }
}
