//! Persisted login session (access token + user profile)
use plaza_common::identity::id_from_value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// On-disk session document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    /// Profile as returned by the backend at login; kept untyped
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            user: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Normalized id of the logged-in user
    pub fn viewer_id(&self) -> Option<String> {
        self.user.as_ref().and_then(id_from_value)
    }
}

/// Session persisted as a JSON file, shared between the API client and hosts
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: Arc<RwLock<Session>>,
}

impl SessionStore {
    /// Open the store at `path`. A missing or unreadable file is a logged-out session.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match read_session(&path) {
            Ok(Some(session)) => {
                info!("Loaded session from {}", path.display());
                session
            }
            Ok(None) => Session::default(),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                Session::default()
            }
        };
        Self {
            path,
            current: Arc::new(RwLock::new(session)),
        }
    }

    /// In-memory store, never written to disk unless `save` is called
    pub fn in_memory(session: Session) -> Self {
        Self {
            path: PathBuf::new(),
            current: Arc::new(RwLock::new(session)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> Session {
        self.current
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().access_token.filter(|t| !t.is_empty())
    }

    pub fn viewer_id(&self) -> Option<String> {
        self.session().viewer_id()
    }

    pub fn save(&self, session: Session) -> Result<(), SessionError> {
        if !self.path.as_os_str().is_empty() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&session)?;
            std::fs::write(&self.path, json)?;
        }
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
        Ok(())
    }

    /// Log out: forget the session and remove the file
    pub fn clear(&self) -> Result<(), SessionError> {
        if let Ok(mut current) = self.current.write() {
            *current = Session::default();
        }
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_session(path: &Path) -> Result<Option<Session>, SessionError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
