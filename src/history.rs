// src/history.rs
use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{muscle_label, ActivityLog, LogId};
use crate::stats::{format_metric, format_two_decimals, DateRange};

/// Entries revealed per "show more".
pub const PAGE_SIZE: usize = 5;

pub const NO_LOGS_MESSAGE: &str = "No logs found for this period.";
pub const NO_BREAKDOWN_MESSAGE: &str = "No data yet.";
pub const REST_DAY_LABEL: &str = "Rest Day";

/// Cursor over the filtered history. Only grows, except on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    visible_count: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            visible_count: PAGE_SIZE,
        }
    }
}

impl HistoryWindow {
    pub const fn visible_count(&self) -> usize {
        self.visible_count
    }

    pub fn show_more(&mut self) {
        self.visible_count += PAGE_SIZE;
    }

    pub fn reset(&mut self) {
        self.visible_count = PAGE_SIZE;
    }

    pub fn page<'a, 'b>(&self, filtered: &'b [&'a ActivityLog]) -> HistoryPage<'a> {
        let shown = self.visible_count.min(filtered.len());
        HistoryPage {
            entries: filtered[..shown].to_vec(),
            remaining: filtered.len() - shown,
        }
    }
}

/// The slice of history currently exposed to the display.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage<'a> {
    pub entries: Vec<&'a ActivityLog>,
    pub remaining: usize,
}

impl HistoryPage<'_> {
    pub const fn has_more(&self) -> bool {
        self.remaining > 0
    }
}

pub fn show_more_label(remaining: usize) -> String {
    format!("Show More ({remaining} remaining)")
}

/// Date range plus pagination cursor, owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    range: DateRange,
    window: HistoryWindow,
}

impl ViewState {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            window: HistoryWindow::default(),
        }
    }

    pub fn for_current_year(today: NaiveDate) -> Self {
        Self::new(DateRange::current_year(today))
    }

    pub const fn range(&self) -> &DateRange {
        &self.range
    }

    pub const fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// Any range change invalidates the cursor, even re-selecting the same range.
    pub fn set_range(&mut self, range: DateRange) {
        self.range = range;
        self.window.reset();
    }

    pub fn set_start(&mut self, start: NaiveDate) {
        self.set_range(DateRange::new(start, self.range.end));
    }

    pub fn set_end(&mut self, end: NaiveDate) {
        self.set_range(DateRange::new(self.range.start, end));
    }

    pub fn show_more(&mut self) {
        self.window.show_more();
    }

    pub fn records_changed(&mut self) {
        self.window.reset();
    }
}

/// One row of the history list, ready to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: LogId,
    pub date: String,
    pub muscles: String,
    pub cardio: Option<String>,
    pub pace: Option<String>,
}

impl HistoryEntry {
    pub fn from_log(log: &ActivityLog) -> Self {
        let cardio = log.is_cardio.then(|| {
            format!(
                "Cardio: {}min / {}km",
                log.cardio_time.map_or_else(|| "-".to_string(), format_metric),
                log.cardio_distance.map_or_else(|| "-".to_string(), format_metric),
            )
        });

        Self {
            id: log.id.clone(),
            date: format_date(log.date),
            muscles: muscles_line(&log.activity_ids),
            cardio,
            pace: log.pace().map(|pace| format!("{} min/km", format_two_decimals(pace))),
        }
    }
}

/// `2023-12-25` -> `25/12/2023`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// "Chest, Triceps", or the rest-day label when nothing was tagged.
pub fn muscles_line(tags: &[String]) -> String {
    if tags.is_empty() {
        return REST_DAY_LABEL.to_string();
    }
    tags.iter()
        .map(|tag| muscle_label(tag))
        .collect::<Vec<_>>()
        .join(", ")
}
