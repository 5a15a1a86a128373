//! Persisted sign-in identity
//!
//! The only thing remembered between runs is the signed-in email address.
//! It lives in `session.json` in the Outreach config directory.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{ClientError, Result};

/// Identity filename in the Outreach config directory
const IDENTITY_FILE: &str = "session.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIdentity {
    email: String,
}

/// Storage for the signed-in email address
pub trait IdentityStore: Send + Sync {
    /// The persisted email, if any
    fn load(&self) -> Result<Option<String>>;

    fn save(&self, email: &str) -> Result<()>;

    /// Forget the identity. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Identity stored as JSON on disk
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Store at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at ~/.config/outreach/session.json
    pub fn default_location() -> Result<Self> {
        let path = config::config_path(IDENTITY_FILE)
            .ok_or_else(|| ClientError::Storage("no config directory available".to_string()))?;
        Ok(Self::at(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let identity: PersistedIdentity = config::load_json_file(&self.path)?;
        let email = identity.email.trim();
        Ok((!email.is_empty()).then(|| email.to_string()))
    }

    fn save(&self, email: &str) -> Result<()> {
        debug!("Persisting identity to {}", self.path.display());
        config::save_json_file(
            &self.path,
            &PersistedIdentity {
                email: email.to_string(),
            },
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        config::remove_file(&self.path)?;
        Ok(())
    }
}

/// Identity kept in memory only
#[derive(Default)]
pub struct MemoryIdentityStore {
    email: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds an identity
    pub fn with_email(email: &str) -> Self {
        Self {
            email: Mutex::new(Some(email.to_string())),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self
            .email
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, email: &str) -> Result<()> {
        *self.email.lock().unwrap_or_else(PoisonError::into_inner) = Some(email.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.email.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
