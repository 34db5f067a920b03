// src/stats.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::{muscle_label, ActivityLog};

/// Inclusive date range. An inverted range simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub const fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Jan 1 through Dec 31 of the year containing `today`.
    pub fn current_year(today: NaiveDate) -> Self {
        let year = today.year();
        // Both dates exist for every year chrono can represent.
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
        let end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

/// Keeps records inside `range`, preserving the caller's (newest-first) order.
pub fn filter_by_range<'a>(records: &'a [ActivityLog], range: &DateRange) -> Vec<&'a ActivityLog> {
    records.iter().filter(|log| range.contains(log.date)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CardioStats {
    pub sessions: usize,
    /// Minutes, full precision.
    pub total_time: f64,
    /// Kilometres, full precision.
    pub total_distance: f64,
}

impl CardioStats {
    /// Minutes per km over all cardio sessions, 0 when no distance was logged.
    pub fn average_pace(&self) -> f64 {
        if self.total_distance > 0.0 {
            self.total_time / self.total_distance
        } else {
            0.0
        }
    }

    pub fn average_pace_display(&self) -> String {
        format_two_decimals(self.average_pace())
    }

    pub fn total_time_display(&self) -> String {
        format_two_decimals(self.total_time)
    }

    pub fn total_distance_display(&self) -> String {
        format_two_decimals(self.total_distance)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityStats {
    pub unique_active_days: usize,
    /// Sessions logged, not tag occurrences.
    pub total_activities: usize,
    /// (label, sessions containing the tag) in first-seen order.
    pub muscle_breakdown: Vec<(String, usize)>,
    pub cardio: CardioStats,
}

impl ActivityStats {
    pub fn compute<'a, I>(logs: I) -> Self
    where
        I: IntoIterator<Item = &'a ActivityLog>,
    {
        let mut days = HashSet::new();
        let mut stats = Self::default();

        for log in logs {
            stats.total_activities += 1;
            days.insert(log.date);

            let mut seen_in_log = HashSet::new();
            for tag in &log.activity_ids {
                // Keyed by label so a raw "Chest" and "chest" are one group.
                let label = muscle_label(tag);
                if !seen_in_log.insert(label) {
                    continue;
                }
                match stats.muscle_breakdown.iter_mut().find(|(name, _)| name == label) {
                    Some((_, count)) => *count += 1,
                    None => stats.muscle_breakdown.push((label.to_string(), 1)),
                }
            }

            if log.is_cardio {
                stats.cardio.sessions += 1;
                stats.cardio.total_time += log.cardio_time.unwrap_or(0.0);
                stats.cardio.total_distance += log.cardio_distance.unwrap_or(0.0);
            }
        }

        stats.unique_active_days = days.len();
        stats
    }

    pub fn breakdown_count(&self, label: &str) -> usize {
        self.muscle_breakdown
            .iter()
            .find(|(name, _)| name == label)
            .map_or(0, |(_, count)| *count)
    }
}

/// Aggregates for a range. `NoData` is distinct from a summary full of zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatsView {
    NoData,
    Summary(ActivityStats),
}

impl StatsView {
    pub fn from_filtered(filtered: &[&ActivityLog]) -> Self {
        if filtered.is_empty() {
            Self::NoData
        } else {
            Self::Summary(ActivityStats::compute(filtered.iter().copied()))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Counters to show; all zero for `NoData`.
    pub fn stats(&self) -> ActivityStats {
        match self {
            Self::NoData => ActivityStats::default(),
            Self::Summary(stats) => stats.clone(),
        }
    }
}

pub fn format_two_decimals(value: f64) -> String {
    format!("{value:.2}")
}

/// Trims trailing zeros for metrics the user typed ("20" rather than "20.00").
pub fn format_metric(value: f64) -> String {
    let rounded = format_two_decimals(value);
    rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_decimals_rounds() {
        assert_eq!(format_two_decimals(5.0), "5.00");
        assert_eq!(format_two_decimals(4.666), "4.67");
        assert_eq!(format_two_decimals(0.0), "0.00");
    }

    #[test]
    fn metric_trims_trailing_zeros() {
        assert_eq!(format_metric(20.0), "20");
        assert_eq!(format_metric(100.0), "100");
        assert_eq!(format_metric(32.5), "32.5");
        assert_eq!(format_metric(0.0), "0");
        assert_eq!(format_metric(1.234), "1.23");
    }
}
