//! Session persistence
//!
//! Tokens and the cached profile survive restarts in two separate files
//! in the session directory. Both are removed on logout.

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{TokenPair, UserProfile};

const TOKENS_FILE: &str = "session.json";
const USER_FILE: &str = "user.json";

/// Errors from the session storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session storage IO error at {path:?}: {error}")]
    Io { path: PathBuf, error: std::io::Error },

    #[error("Session storage holds invalid data at {path:?}: {error}")]
    Corrupt { path: PathBuf, error: String },
}

/// Where session state is kept between runs
pub trait SessionStorage: Send + Sync {
    fn load_tokens(&self) -> Result<Option<TokenPair>, StorageError>;
    fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StorageError>;
    fn load_user(&self) -> Result<Option<UserProfile>, StorageError>;
    fn save_user(&self, user: &UserProfile) -> Result<(), StorageError>;
    /// Remove everything; missing entries are not an error
    fn clear(&self) -> Result<(), StorageError>;
}

/// JSON files in a per-user directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(StorageError::Io { path, error }),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                path,
                error: e.to_string(),
            })
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|error| StorageError::Io {
            path: self.dir.clone(),
            error,
        })?;

        let path = self.dir.join(name);
        let content = serde_json::to_string_pretty(value).map_err(|e| StorageError::Corrupt {
            path: path.clone(),
            error: e.to_string(),
        })?;

        // Write then rename so a crash never leaves half a token file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|error| StorageError::Io {
            path: tmp.clone(),
            error,
        })?;
        restrict_permissions(&tmp);
        std::fs::rename(&tmp, &path).map_err(|error| StorageError::Io { path, error })
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::Io { path, error }),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = ?path, error = %e, "Could not restrict session file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl SessionStorage for FileStorage {
    fn load_tokens(&self) -> Result<Option<TokenPair>, StorageError> {
        self.read(TOKENS_FILE)
    }

    fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        self.write(TOKENS_FILE, tokens)
    }

    fn load_user(&self) -> Result<Option<UserProfile>, StorageError> {
        self.read(USER_FILE)
    }

    fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        self.write(USER_FILE, user)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.remove(TOKENS_FILE)?;
        self.remove(USER_FILE)
    }
}

/// In-process storage, nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tokens: Mutex<Option<TokenPair>>,
    user: Mutex<Option<UserProfile>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn load_tokens(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = Some(tokens.clone());
        Ok(())
    }

    fn load_user(&self) -> Result<Option<UserProfile>, StorageError> {
        Ok(self.user.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = Some(user.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.user.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
