use std::collections::HashMap;
#[cfg(feature = "file-storage")]
use std::collections::BTreeMap;
#[cfg(feature = "file-storage")]
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;

/// Durable client-side key/value storage.
///
/// Plays the role of the browser's `localStorage`: values written here
/// survive a restart and are read back during rehydration. Implementations
/// must be cheap enough to call on every login, refresh and logout.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStorage for KeychainStorage {
///     fn get(&self, key: &str) -> Result<Option<String>, Error> {
///         self.keychain.read(key).map_err(|e| Error::Storage(e.to_string()))
///     }
///
///     fn set(&self, key: &str, value: &str) -> Result<(), Error> {
///         self.keychain.write(key, value).map_err(|e| Error::Storage(e.to_string()))
///     }
///
///     fn remove(&self, key: &str) -> Result<(), Error> {
///         self.keychain.delete(key).map_err(|e| Error::Storage(e.to_string()))
///     }
/// }
/// ```
pub trait TokenStorage: Send + Sync + 'static {
    /// Read a value. Returns `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local storage. Nothing survives a restart; clones do not share
/// state, wrap it in an `Arc` to share.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, as if a previous run had stored it.
    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.lock().insert(key.into(), value.into());
        self
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous contents intact.
#[cfg(feature = "file-storage")]
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

#[cfg(feature = "file-storage")]
impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), Error> {
        let io_err = |e: std::io::Error| Error::Storage(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(values)?;
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

#[cfg(feature = "file-storage")]
impl TokenStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_owned(), value.to_owned());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}
