// src/store.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{ActivityLog, LogId, NewActivityLog};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Remote { status: u16, message: String },
    #[error("Activity log not found: ID {0}")]
    NotFound(LogId),
    #[error("Not signed in. Use 'login' first.")]
    NotAuthenticated,
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("Invalid sign-in response: {0}")]
    InvalidSignIn(String),
    #[error("Malformed record from store: {0}")]
    Malformed(String),
    #[error("I/O error accessing session file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for activity logs. `list` returns newest first.
pub trait RecordStore {
    fn list(&self) -> Result<Vec<ActivityLog>, StoreError>;
    fn insert(&mut self, log: NewActivityLog) -> Result<LogId, StoreError>;
    /// Replaces every field except the id.
    fn update(&mut self, id: &LogId, log: NewActivityLog) -> Result<(), StoreError>;
    fn delete(&mut self, id: &LogId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub signed_in_at: DateTime<Utc>,
}

/// What the caller has to do next after starting a sign-in.
#[derive(Debug, Clone, PartialEq)]
pub enum SignIn {
    /// Open this URL in a browser, then hand the final redirect URL back.
    Redirect(String),
    /// A link (and one-time code) was mailed to the address.
    EmailSent,
    SignedIn(Session),
}

/// Evidence that finishes a pending sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInProof {
    RedirectUrl(String),
    EmailCode { email: String, code: String },
}

pub type SessionCallback = Box<dyn FnMut(Option<&Session>)>;

pub trait AuthClient {
    fn sign_in_with_oauth(&mut self, provider: OAuthProvider) -> Result<SignIn, StoreError>;
    fn sign_in_with_email_link(&mut self, email: &str) -> Result<SignIn, StoreError>;
    fn complete_sign_in(&mut self, proof: SignInProof) -> Result<Session, StoreError>;
    fn sign_out(&mut self) -> Result<(), StoreError>;
    fn session(&self) -> Option<&Session>;
    fn on_session_change(&mut self, callback: SessionCallback);
}

/// A store that also handles authentication.
pub trait Backend: RecordStore + AuthClient {}

impl<T: RecordStore + AuthClient> Backend for T {}
