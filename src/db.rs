// src/db.rs
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::SessionHub;
use crate::model::{ActivityLog, LogId, NewActivityLog};
use crate::store::{
    AuthClient, OAuthProvider, RecordStore, Session, SessionCallback, SignIn, SignInProof,
    StoreError,
};

/// Owner of records logged before anyone signs in.
pub const LOCAL_USER_ID: &str = "local";

const DB_FILE_NAME: &str = "gym-log.sqlite";
const APP_DATA_DIR: &str = "gym-log";
const DATA_ENV_VAR: &str = "GYM_LOG_DATA_DIR";

#[derive(Error, Debug)]
pub enum DataDirError {
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error creating data directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding the database and the saved session. Created if missing.
pub fn get_data_dir() -> Result<PathBuf, DataDirError> {
    let app_dir = match std::env::var(DATA_ENV_VAR) {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::data_dir().ok_or(DataDirError::DataDir)?.join(APP_DATA_DIR),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir)
}

pub fn get_db_path() -> Result<PathBuf, DataDirError> {
    Ok(get_data_dir()?.join(DB_FILE_NAME))
}

/// Initializes the database tables if they don't exist.
pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_logs (
            seq INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order, breaks ties within a date
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,                    -- YYYY-MM-DD
            activity_ids TEXT NOT NULL DEFAULT '[]', -- JSON array of tag ids
            is_cardio INTEGER NOT NULL DEFAULT 0,
            cardio_time REAL,
            cardio_distance REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_logs_user_date ON activity_logs (user_id, date)",
        [],
    )?;

    Ok(())
}

fn map_row_to_log(row: &Row) -> Result<ActivityLog, rusqlite::Error> {
    let id: String = row.get(0)?;
    let date: NaiveDate = row.get(1)?;
    let tags_json: String = row.get(2)?;
    let is_cardio: bool = row.get(3)?;
    let cardio_time: Option<f64> = row.get(4)?;
    let cardio_distance: Option<f64> = row.get(5)?;

    let activity_ids = match serde_json::from_str::<Vec<String>>(&tags_json) {
        Ok(tags) => tags,
        Err(e) => {
            // Don't fail the whole listing over one bad row
            warn!(id = %id, "Unreadable activity_ids '{}': {}. Treating as no tags.", tags_json, e);
            Vec::new()
        }
    };

    Ok(ActivityLog {
        id: LogId::new(id),
        date,
        activity_ids,
        is_cardio,
        cardio_time,
        cardio_distance,
    })
}

fn tags_to_json(tags: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(tags)?)
}

/// Local record store backed by SQLite.
pub struct SqliteStore {
    conn: Connection,
    sessions: SessionHub,
}

impl SqliteStore {
    pub fn new(conn: Connection, sessions: SessionHub) -> Result<Self, StoreError> {
        init(&conn)?;
        Ok(Self { conn, sessions })
    }

    pub fn open<P: AsRef<Path>>(path: P, sessions: SessionHub) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::new(conn, sessions)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::new(Connection::open_in_memory()?, SessionHub::in_memory())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn user_id(&self) -> &str {
        self.sessions
            .current()
            .map_or(LOCAL_USER_ID, |session| session.user_id.as_str())
    }

    fn find_or_create_user(&self, email: &str) -> Result<String, StoreError> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        self.conn
            .execute("INSERT INTO users (id, email) VALUES (?1, ?2)", params![id, email])?;
        info!(user_id = %id, "Created local user for {}", email);
        Ok(id)
    }
}

impl RecordStore for SqliteStore {
    fn list(&self) -> Result<Vec<ActivityLog>, StoreError> {
        let user_id = self.user_id();
        debug!(user_id, "Listing activity logs");
        let mut stmt = self.conn.prepare(
            "SELECT id, date, activity_ids, is_cardio, cardio_time, cardio_distance
             FROM activity_logs
             WHERE user_id = ?1
             ORDER BY date DESC, seq DESC",
        )?;
        let rows = stmt.query_map(params![user_id], map_row_to_log)?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok(logs)
    }

    fn insert(&mut self, log: NewActivityLog) -> Result<LogId, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO activity_logs (id, user_id, date, activity_ids, is_cardio, cardio_time, cardio_distance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                self.user_id(),
                log.date,
                tags_to_json(&log.activity_ids)?,
                log.is_cardio,
                log.cardio_time,
                log.cardio_distance,
            ],
        )?;
        info!(id = %id, date = %log.date, "Inserted activity log");
        Ok(LogId::new(id))
    }

    fn update(&mut self, id: &LogId, log: NewActivityLog) -> Result<(), StoreError> {
        let rows_affected = self.conn.execute(
            "UPDATE activity_logs
             SET date = ?1, activity_ids = ?2, is_cardio = ?3, cardio_time = ?4, cardio_distance = ?5
             WHERE id = ?6 AND user_id = ?7",
            params![
                log.date,
                tags_to_json(&log.activity_ids)?,
                log.is_cardio,
                log.cardio_time,
                log.cardio_distance,
                id.as_str(),
                self.user_id(),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        info!(id = %id, "Updated activity log");
        Ok(())
    }

    fn delete(&mut self, id: &LogId) -> Result<(), StoreError> {
        let rows_affected = self.conn.execute(
            "DELETE FROM activity_logs WHERE id = ?1 AND user_id = ?2",
            params![id.as_str(), self.user_id()],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        info!(id = %id, "Deleted activity log");
        Ok(())
    }
}

impl AuthClient for SqliteStore {
    fn sign_in_with_oauth(&mut self, _provider: OAuthProvider) -> Result<SignIn, StoreError> {
        Err(StoreError::Unsupported("OAuth sign-in"))
    }

    /// There is no mail server locally: the address alone selects the account.
    fn sign_in_with_email_link(&mut self, email: &str) -> Result<SignIn, StoreError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(StoreError::InvalidSignIn(format!("'{email}' is not an email address")));
        }
        let user_id = self.find_or_create_user(email)?;
        let session = Session {
            user_id,
            email: Some(email.to_string()),
            access_token: None,
            refresh_token: None,
            signed_in_at: Utc::now(),
        };
        self.sessions.set(Some(session.clone()))?;
        Ok(SignIn::SignedIn(session))
    }

    fn complete_sign_in(&mut self, _proof: SignInProof) -> Result<Session, StoreError> {
        Err(StoreError::Unsupported("Completing a pending sign-in"))
    }

    fn sign_out(&mut self) -> Result<(), StoreError> {
        self.sessions.set(None)
    }

    fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    fn on_session_change(&mut self, callback: SessionCallback) {
        self.sessions.subscribe(callback);
    }
}
