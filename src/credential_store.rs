//! Credential storage for the session tokens and the serialized user

use crate::error::Result;
use papaya::HashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Storage keys for the persisted session
pub struct CredentialKeys;

impl CredentialKeys {
    /// Bearer access token
    pub const AUTH_TOKEN: &'static str = "auth_token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// User record (JSON)
    pub const AUTH_USER: &'static str = "auth_user";

    pub const ALL: [&'static str; 3] = [Self::AUTH_TOKEN, Self::REFRESH_TOKEN, Self::AUTH_USER];
}

/// Key-value storage for credentials
///
/// Each operation is atomic per key. Concurrent writers are tolerated with
/// last-write-wins semantics.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Process-lifetime store using Papaya HashMap
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    values: Arc<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.pin().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.pin().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values.pin().remove(key);
        Ok(())
    }
}

/// Durable store: a Papaya cache mirrored to a JSON file
///
/// Every mutation rewrites the whole file through a temp file and a rename, so
/// a crash leaves either the old or the new contents on disk. A failed write
/// leaves the cache untouched.
pub struct FileCredentialStore {
    path: PathBuf,
    cache: HashMap<String, String>,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading existing contents if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cache = HashMap::new();

        match fs::read(&path) {
            Ok(bytes) => {
                let stored: BTreeMap<String, String> = serde_json::from_slice(&bytes)?;
                let pinned = cache.pin();
                for (key, value) in stored {
                    pinned.insert(key, value);
                }
                debug!(path = %path.display(), "Loaded credential store");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Ok(Self {
            path,
            cache,
            write_lock: Mutex::new(()),
        })
    }

    /// `<data dir>/boletos/credentials.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("boletos").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the change to disk first and apply it to the cache only once the
    /// file is in place, so the cache never holds state the file does not.
    fn apply(&self, key: &str, value: Option<&str>) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut snapshot: BTreeMap<String, String> = self
            .cache
            .pin()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        match value {
            Some(value) => {
                snapshot.insert(key.to_string(), value.to_string());
            }
            None => {
                if snapshot.remove(key).is_none() {
                    return Ok(());
                }
            }
        }

        self.write_file(&snapshot)?;

        let pinned = self.cache.pin();
        match value {
            Some(value) => {
                pinned.insert(key.to_string(), value.to_string());
            }
            None => {
                pinned.remove(key);
            }
        }
        Ok(())
    }

    fn write_file(&self, snapshot: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_vec_pretty(snapshot)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut options = fs::OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp_path)?;
            file.write_all(&contents)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.pin().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(key, Some(value))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.apply(key, None)
    }
}
