// src/auth.rs
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::store::{Session, SessionCallback, StoreError};

/// Current session, its file on disk, and everyone who wants to hear about changes.
#[derive(Default)]
pub struct SessionHub {
    current: Option<Session>,
    path: Option<PathBuf>,
    watchers: Vec<SessionCallback>,
}

impl SessionHub {
    /// Session kept only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Restores a previously saved session from `path`, if any.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let current = if path.exists() {
            let content = fs::read_to_string(path)?;
            let session: Session = serde_json::from_str(&content)?;
            debug!(user_id = %session.user_id, "Restored session from {:?}", path);
            Some(session)
        } else {
            None
        };
        Ok(Self {
            current,
            path: Some(path.to_path_buf()),
            watchers: Vec::new(),
        })
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn subscribe(&mut self, callback: SessionCallback) {
        self.watchers.push(callback);
    }

    /// Replaces the session, persists it and notifies watchers.
    pub fn set(&mut self, session: Option<Session>) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            match &session {
                Some(session) => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, serde_json::to_string_pretty(session)?)?;
                }
                None => {
                    if path.exists() {
                        fs::remove_file(path)?;
                    }
                }
            }
        }

        match &session {
            Some(s) => info!(user_id = %s.user_id, "Signed in"),
            None => info!("Signed out"),
        }
        self.current = session;
        for watcher in &mut self.watchers {
            watcher(self.current.as_ref());
        }
        Ok(())
    }
}
