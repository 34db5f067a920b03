// src/form.rs
use chrono::{Local, NaiveDate};

use crate::model::{ActivityLog, MuscleGroup, NewActivityLog};

/// Raw user input for a log entry, shared by the create and edit flows.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityForm {
    pub date: NaiveDate,
    /// Tag ids in display order. Tags outside the vocabulary on an edited
    /// record stay where they were.
    tags: Vec<String>,
    pub is_cardio: bool,
    pub cardio_time: String,
    pub cardio_distance: String,
}

impl Default for ActivityForm {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl ActivityForm {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            tags: Vec::new(),
            is_cardio: false,
            cardio_time: String::new(),
            cardio_distance: String::new(),
        }
    }

    /// Pre-fills the form from an existing record for editing.
    pub fn from_log(log: &ActivityLog) -> Self {
        let mut form = Self::new(log.date);
        for tag in &log.activity_ids {
            if !form.tags.contains(tag) {
                form.tags.push(tag.clone());
            }
        }
        form.is_cardio = log.is_cardio;
        form.cardio_time = log.cardio_time.map(|v| v.to_string()).unwrap_or_default();
        form.cardio_distance = log.cardio_distance.map(|v| v.to_string()).unwrap_or_default();
        form
    }

    /// Checked groups in selection order.
    pub fn selected(&self) -> Vec<MuscleGroup> {
        self.tags
            .iter()
            .filter_map(|tag| MuscleGroup::from_id(tag))
            .collect()
    }

    pub fn is_selected(&self, group: MuscleGroup) -> bool {
        self.tags.iter().any(|tag| tag == group.id())
    }

    /// Checks or unchecks a group; newly checked groups go to the end.
    pub fn toggle(&mut self, group: MuscleGroup) {
        if let Some(pos) = self.tags.iter().position(|tag| tag == group.id()) {
            self.tags.remove(pos);
        } else {
            self.tags.push(group.id().to_string());
        }
    }

    /// Replaces the checked groups. Tags outside the vocabulary are kept.
    pub fn set_selected(&mut self, groups: impl IntoIterator<Item = MuscleGroup>) {
        self.tags.retain(|tag| MuscleGroup::from_id(tag).is_none());
        for group in groups {
            if !self.is_selected(group) {
                self.tags.push(group.id().to_string());
            }
        }
    }

    pub fn build(&self) -> NewActivityLog {
        let (cardio_time, cardio_distance) = if self.is_cardio {
            (parse_metric(&self.cardio_time), parse_metric(&self.cardio_distance))
        } else {
            (None, None)
        };

        NewActivityLog {
            date: self.date,
            activity_ids: self.tags.clone(),
            is_cardio: self.is_cardio,
            cardio_time,
            cardio_distance,
        }
    }
}

/// Empty, unparsable, non-finite or negative input means "not logged".
pub fn parse_metric(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}
