//! Persistence media for the durable cache
//!
//! A [`Storage`] is a flat string key/value store. [`FileStorage`] keeps one JSON
//! file per key in an XDG-compliant cache directory; [`MemoryStorage`] keeps
//! everything in a map and is mostly useful for tests.

use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a persistence medium
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The medium refused the write
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value persistence contract used by [`DurableCache`](super::DurableCache)
pub trait Storage: Send + Sync {
    /// Returns the stored string for `key`, if any
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every stored key
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Stores each key as a JSON file on disk
///
/// Uses `~/.cache/briefing/` on Linux, or the equivalent XDG path elsewhere.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where cache files are stored
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a FileStorage in the platform cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "briefing")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a FileStorage rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.item_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.item_path(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.item_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Some(key) = decode_key(stem) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

/// Stores items in a process-local map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.lock().keys().cloned().collect())
    }
}

/// Makes a key safe to use as a file name, reversibly
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([byte]));
        }
    }
    out
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let pair = encoded.get(i + 1..i + 3)?;
            out.extend(hex::decode(pair).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = FileStorage::with_dir(temp_dir.path().to_path_buf());
        (storage, temp_dir)
    }

    #[test]
    fn test_set_item_creates_file_in_directory() {
        let (storage, temp_dir) = create_test_storage();

        storage.set_item("news-latest", "{}").expect("Write should succeed");

        assert!(temp_dir.path().join("news-latest.json").exists());
    }

    #[test]
    fn test_get_item_returns_none_for_missing_key() {
        let (storage, _temp_dir) = create_test_storage();

        let result = storage.get_item("nonexistent").expect("Read should succeed");

        assert!(result.is_none());
    }

    #[test]
    fn test_set_then_get_item() {
        let (storage, _temp_dir) = create_test_storage();

        storage.set_item("k", "value").expect("Write should succeed");

        assert_eq!(storage.get_item("k").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn test_set_item_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache");
        let storage = FileStorage::with_dir(nested_path.clone());

        storage.set_item("k", "v").expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
    }

    #[test]
    fn test_remove_missing_item_is_ok() {
        let (storage, _temp_dir) = create_test_storage();

        assert!(storage.remove_item("never-written").is_ok());
    }

    #[test]
    fn test_keys_round_trip_through_file_names() {
        let (storage, _temp_dir) = create_test_storage();

        storage.set_item("weather-49.28,-123.12", "1").unwrap();
        storage.set_item("translation-es-ab12", "2").unwrap();

        let mut keys = storage.keys().unwrap();
        keys.sort();

        assert_eq!(keys, vec!["translation-es-ab12", "weather-49.28,-123.12"]);
    }

    #[test]
    fn test_keys_on_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::with_dir(temp_dir.path().join("absent"));

        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_encode_key_escapes_path_separators() {
        let encoded = encode_key("a/b:c");

        assert!(!encoded.contains('/'));
        assert_eq!(decode_key(&encoded), Some("a/b:c".to_string()));
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(storage) = FileStorage::new() {
            let path_str = storage.dir().to_string_lossy();
            assert!(path_str.contains("briefing"));
        }
        // Passes if new() returns None (e.g., no home directory in CI)
    }

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();

        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), Some("1".to_string()));

        storage.remove_item("a").unwrap();
        assert!(storage.get_item("a").unwrap().is_none());
    }
}
