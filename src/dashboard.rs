// src/dashboard.rs
use tracing::{info, warn};

use crate::history::{HistoryEntry, ViewState};
use crate::model::{ActivityLog, LogId};
use crate::stats::{filter_by_range, DateRange, StatsView};
use crate::store::{RecordStore, StoreError};

/// In-memory copy of the user's records, newest first as fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBook {
    logs: Vec<ActivityLog>,
}

/// A record taken out of the book while the store confirms its deletion.
#[derive(Debug)]
#[must_use = "a pending delete must be committed or rolled back"]
pub struct PendingDelete {
    index: usize,
    log: ActivityLog,
}

impl PendingDelete {
    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// The store acknowledged the delete; the record is gone for good.
    pub fn commit(self) -> ActivityLog {
        self.log
    }
}

impl LogBook {
    pub fn new(logs: Vec<ActivityLog>) -> Self {
        Self { logs }
    }

    pub fn logs(&self) -> &[ActivityLog] {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn get(&self, id: &LogId) -> Option<&ActivityLog> {
        self.logs.iter().find(|log| &log.id == id)
    }

    /// Tentatively removes a record. Nothing is removed for an unknown id.
    pub fn take(&mut self, id: &LogId) -> Option<PendingDelete> {
        let index = self.logs.iter().position(|log| &log.id == id)?;
        let log = self.logs.remove(index);
        Some(PendingDelete { index, log })
    }

    /// Puts the record back where it was.
    pub fn rollback(&mut self, pending: PendingDelete) {
        let index = pending.index.min(self.logs.len());
        self.logs.insert(index, pending.log);
    }
}

/// Host-side callbacks for the history list's edit and delete affordances.
pub trait IntentHandler {
    /// Populate the form with `log` for editing.
    fn on_edit(&mut self, log: ActivityLog);
    /// Ask the user before deleting. Returning false cancels.
    fn confirm_delete(&mut self, log: &ActivityLog) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(LogId),
    Cancelled,
}

/// Everything the stats screen shows for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub range: DateRange,
    pub stats: StatsView,
    pub history: Vec<HistoryEntry>,
    pub remaining: usize,
}

impl DashboardView {
    pub const fn has_more(&self) -> bool {
        self.remaining > 0
    }
}

/// Records plus the view state the stats screen derives from them.
#[derive(Debug, Clone)]
pub struct Dashboard {
    book: LogBook,
    view: ViewState,
}

impl Dashboard {
    pub fn new(records: Vec<ActivityLog>, view: ViewState) -> Self {
        Self {
            book: LogBook::new(records),
            view,
        }
    }

    pub fn book(&self) -> &LogBook {
        &self.book
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    /// Installs a fresh fetch from the store.
    pub fn replace_records(&mut self, records: Vec<ActivityLog>) {
        self.book = LogBook::new(records);
        self.view.records_changed();
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.view.set_range(range);
    }

    pub fn show_more(&mut self) {
        self.view.show_more();
    }

    pub fn filtered(&self) -> Vec<&ActivityLog> {
        filter_by_range(self.book.logs(), self.view.range())
    }

    pub fn render(&self) -> DashboardView {
        let filtered = self.filtered();
        let page = self.view.window().page(&filtered);
        DashboardView {
            range: *self.view.range(),
            stats: StatsView::from_filtered(&filtered),
            history: page.entries.iter().map(|log| HistoryEntry::from_log(log)).collect(),
            remaining: page.remaining,
        }
    }

    /// Hands the record to the host's edit path. Returns false for an unknown id.
    pub fn request_edit(&self, id: &LogId, handler: &mut dyn IntentHandler) -> bool {
        match self.book.get(id) {
            Some(log) => {
                handler.on_edit(log.clone());
                true
            }
            None => false,
        }
    }

    /// Confirms with the host, removes locally, then deletes in the store.
    /// A store failure puts the record back and is returned to the caller.
    pub fn request_delete<S: RecordStore + ?Sized>(
        &mut self,
        id: &LogId,
        store: &mut S,
        handler: &mut dyn IntentHandler,
    ) -> Result<DeleteOutcome, StoreError> {
        let Some(log) = self.book.get(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        if !handler.confirm_delete(log) {
            return Ok(DeleteOutcome::Cancelled);
        }

        let Some(pending) = self.book.take(id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        match store.delete(id) {
            Ok(()) => {
                pending.commit();
                self.view.records_changed();
                info!(id = %id, "Delete confirmed by store");
                Ok(DeleteOutcome::Deleted(id.clone()))
            }
            Err(e) => {
                warn!(id = %id, "Delete failed, restoring record: {}", e);
                self.book.rollback(pending);
                Err(e)
            }
        }
    }
}
