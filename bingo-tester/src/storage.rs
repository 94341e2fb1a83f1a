use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bingo_engine::{CardStorage, MemoryStorage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage key '{0}' cannot be used as a file name")]
    InvalidKey(String),
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One JSON file per storage key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Open a directory after deleting whatever it held.
    pub fn fresh(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        match fs::remove_dir_all(&root) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(StorageError::Io { path: root, source }),
        }
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl CardStorage for FileStorage {
    type Error = StorageError;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Backend a scenario run persists through.
#[derive(Debug, Clone)]
pub enum ScenarioStorage {
    Memory(MemoryStorage),
    Files(FileStorage),
}

impl ScenarioStorage {
    /// Every stored record, for expectations that inspect the raw snapshots.
    pub fn records(&self, keys: &[String]) -> Vec<(String, Option<String>)> {
        keys.iter()
            .map(|key| (key.clone(), self.read(key).ok().flatten()))
            .collect()
    }
}

impl CardStorage for ScenarioStorage {
    type Error = StorageError;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        match self {
            Self::Memory(memory) => Ok(memory.get(key)),
            Self::Files(files) => files.read(key),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        match self {
            Self::Memory(memory) => {
                memory.insert(key, value);
                Ok(())
            }
            Self::Files(files) => files.write(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        match self {
            Self::Memory(memory) => {
                let _ = memory.remove(key);
                Ok(())
            }
            Self::Files(files) => files.remove(key),
        }
    }
}
