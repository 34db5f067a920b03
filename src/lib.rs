use anyhow::{bail, Context, Result};
// Use anyhow::Result as standard Result for service layer
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// --- Declare modules ---
pub mod auth;
mod config;
pub mod dashboard;
pub mod db;
pub mod form;
pub mod history;
pub mod model;
pub mod remote;
pub mod stats;
pub mod store;

// --- Expose public types ---
pub use auth::SessionHub;
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, BackendKind, Config, Error as ConfigError, RemoteConfig,
    StandardColor, Theme,
};
pub use dashboard::{Dashboard, DashboardView, DeleteOutcome, IntentHandler, LogBook};
pub use db::{get_data_dir as get_data_dir_util, get_db_path as get_db_path_util, SqliteStore};
pub use form::{parse_metric, ActivityForm};
pub use history::{
    format_date, show_more_label, HistoryEntry, HistoryWindow, ViewState, NO_BREAKDOWN_MESSAGE,
    NO_LOGS_MESSAGE, PAGE_SIZE,
};
pub use model::{muscle_label, ActivityLog, LogId, MuscleGroup, NewActivityLog};
pub use remote::RemoteStore;
pub use stats::{
    filter_by_range, format_two_decimals, ActivityStats, CardioStats, DateRange, StatsView,
};
pub use store::{
    AuthClient, Backend, OAuthProvider, RecordStore, Session, SessionCallback, SignIn,
    SignInProof, StoreError,
};

const SESSION_FILE_NAME: &str = "session.json";

pub struct AppService {
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub backend: Box<dyn Backend>,
    pub dashboard: Dashboard,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/data path determination, loading, or opening the backend fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let data_dir = db::get_data_dir().context("Failed to determine data directory")?;
        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let sessions = SessionHub::load(&data_dir.join(SESSION_FILE_NAME))
            .context("Failed to restore saved session")?;

        let backend: Box<dyn Backend> = match config.backend {
            BackendKind::Local => Box::new(
                SqliteStore::open(&db_path, sessions)
                    .with_context(|| format!("Failed to open database at {db_path:?}"))?,
            ),
            BackendKind::Remote => {
                let (url, key) = config.remote_credentials(&config_path)?;
                Box::new(RemoteStore::new(
                    url,
                    key,
                    config.remote.redirect_to.clone(),
                    sessions,
                ))
            }
        };
        debug!(backend = ?config.backend, "Backend opened");

        Ok(Self::with_backend(
            config,
            config_path,
            db_path,
            backend,
            Local::now().date_naive(),
        ))
    }

    /// Builds a service around an already-open backend. The range starts as `today`'s year.
    pub fn with_backend(
        config: Config,
        config_path: PathBuf,
        db_path: PathBuf,
        backend: Box<dyn Backend>,
        today: NaiveDate,
    ) -> Self {
        Self {
            config,
            config_path,
            db_path,
            backend,
            dashboard: Dashboard::new(Vec::new(), ViewState::for_current_year(today)),
        }
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    /// Selects the backend used from the next run on.
    /// # Errors
    /// Returns `ConfigError` if the remote backend is chosen without credentials, or saving fails.
    pub fn set_backend(&mut self, kind: BackendKind) -> Result<(), ConfigError> {
        if kind == BackendKind::Remote {
            self.config.remote_credentials(&self.config_path)?;
        }
        self.config.backend = kind;
        self.save_config()
    }

    /// Stores the hosted backend's URL, key and optional redirect target.
    /// # Errors
    /// Returns `ConfigError` variants if saving fails.
    pub fn set_remote(
        &mut self,
        url: &str,
        anon_key: &str,
        redirect_to: Option<String>,
    ) -> Result<(), ConfigError> {
        self.config.remote = RemoteConfig {
            url: Some(url.trim().to_string()),
            anon_key: Some(anon_key.trim().to_string()),
            redirect_to,
        };
        self.save_config()
    }

    /// Re-fetches every record and resets the history cursor.
    /// # Errors
    /// Returns the store error (e.g. not signed in, network failure) with context.
    pub fn refresh(&mut self) -> Result<()> {
        let records = self.backend.list().context("Failed to load activity logs")?;
        debug!(count = records.len(), "Fetched activity logs");
        self.dashboard.replace_records(records);
        Ok(())
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.dashboard.set_range(range);
    }

    pub fn show_more(&mut self) {
        self.dashboard.show_more();
    }

    pub fn render(&self) -> DashboardView {
        self.dashboard.render()
    }

    /// Looks a record up in the last fetch.
    pub fn find_log(&self, id: &LogId) -> Option<&ActivityLog> {
        self.dashboard.book().get(id)
    }

    /// Inserts the form's record, then re-fetches.
    /// # Errors
    /// Returns `anyhow::Error` wrapping the store error if the insert or re-fetch fails.
    pub fn add_log(&mut self, form: &ActivityForm) -> Result<LogId> {
        let id = self
            .backend
            .insert(form.build())
            .context("Failed to save activity log")?;
        self.refresh()?;
        Ok(id)
    }

    /// Replaces every field of record `id` with the form's values, then re-fetches.
    /// # Errors
    /// Returns `anyhow::Error` wrapping `StoreError::NotFound` or other store failures.
    pub fn edit_log(&mut self, id: &LogId, form: &ActivityForm) -> Result<()> {
        self.backend
            .update(id, form.build())
            .with_context(|| format!("Failed to update activity log {id}"))?;
        self.refresh()
    }

    /// Starts the edit flow for a record from the current fetch.
    /// # Errors
    /// Returns `StoreError::NotFound` if the record isn't in the current fetch.
    pub fn request_edit(&self, id: &LogId, handler: &mut dyn IntentHandler) -> Result<()> {
        if !self.dashboard.request_edit(id, handler) {
            bail!(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    /// Deletes after confirmation, removing the record locally first and
    /// restoring it if the store refuses.
    /// # Errors
    /// Returns the store error if the delete failed; the record is back in place.
    pub fn delete_log(
        &mut self,
        id: &LogId,
        handler: &mut dyn IntentHandler,
    ) -> Result<DeleteOutcome> {
        self.dashboard
            .request_delete(id, self.backend.as_mut(), handler)
            .with_context(|| format!("Failed to delete activity log {id}"))
    }

    /// Starts OAuth sign-in.
    /// # Errors
    /// Returns `StoreError::Unsupported` on the local backend.
    pub fn sign_in_with_oauth(&mut self, provider: OAuthProvider) -> Result<SignIn> {
        let step = self
            .backend
            .sign_in_with_oauth(provider)
            .with_context(|| format!("Failed to start {provider} sign-in"))?;
        self.after_auth_change(&step);
        Ok(step)
    }

    /// Starts passwordless email sign-in.
    /// # Errors
    /// Returns `anyhow::Error` wrapping the store error if the request fails.
    pub fn sign_in_with_email_link(&mut self, email: &str) -> Result<SignIn> {
        let step = self
            .backend
            .sign_in_with_email_link(email)
            .context("Failed to start email sign-in")?;
        self.after_auth_change(&step);
        Ok(step)
    }

    /// Finishes a pending sign-in.
    /// # Errors
    /// Returns `anyhow::Error` wrapping the store error if the proof is rejected.
    pub fn complete_sign_in(&mut self, proof: SignInProof) -> Result<Session> {
        let session = self
            .backend
            .complete_sign_in(proof)
            .context("Failed to complete sign-in")?;
        self.dashboard.replace_records(Vec::new());
        Ok(session)
    }

    /// # Errors
    /// Returns `anyhow::Error` wrapping the store error if sign-out fails.
    pub fn sign_out(&mut self) -> Result<()> {
        self.backend.sign_out().context("Failed to sign out")?;
        self.dashboard.replace_records(Vec::new());
        info!("Cleared in-memory records after sign-out");
        Ok(())
    }

    pub fn session(&self) -> Option<&Session> {
        self.backend.session()
    }

    pub fn on_session_change(&mut self, callback: SessionCallback) {
        self.backend.on_session_change(callback);
    }

    // Records from a previous account must not leak into the new one's view.
    fn after_auth_change(&mut self, step: &SignIn) {
        if matches!(step, SignIn::SignedIn(_)) {
            self.dashboard.replace_records(Vec::new());
        }
    }
}
