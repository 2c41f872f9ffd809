//! Bearer-token storage between runs
//!
//! Keeps the token issued by `/api/login` so protected requests can be
//! made without logging in again.

use crate::types::{CoinpulseError, Result};
use directories::BaseDirs;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Persisted session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Account the token was issued to
    pub username: String,
    /// Bearer token
    pub access_token: String,
    /// Unix timestamp of login
    pub created_at: i64,
}

/// Reads and writes the session file
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store under the default directory (~/.coinpulse)
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| CoinpulseError::Session("Cannot determine home directory".into()))?;
        Ok(Self {
            dir: base_dirs.home_dir().join(".coinpulse"),
        })
    }

    /// Store under a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("session.json")
    }

    /// Load the saved session. Missing or unreadable files yield `None`.
    pub fn load(&self) -> Option<Session> {
        let content = fs::read_to_string(self.path()).ok()?;
        // Corrupted file counts as logged out
        serde_json::from_str(&content).ok()
    }

    /// Token of the saved session, if any
    pub fn token(&self) -> Option<String> {
        self.load().map(|s| s.access_token)
    }

    /// Save a freshly issued token
    pub fn save(&self, username: &str, access_token: &str) -> Result<Session> {
        fs::create_dir_all(&self.dir)?;

        let session = Session {
            username: username.to_string(),
            access_token: access_token.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        let content = serde_json::to_string_pretty(&session)
            .map_err(|e| CoinpulseError::Session(format!("Serialization failed: {}", e)))?;

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(self.path())?;
        // mode() only applies on create; tighten a file left by an older run
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.lock_exclusive()?;
        file.set_len(0)?;
        let written = file.write_all(content.as_bytes());
        file.unlock()?;
        written?;

        Ok(session)
    }

    /// Remove the saved session
    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
