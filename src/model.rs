// src/model.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Opaque identifier assigned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

impl LogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The fixed muscle-group vocabulary, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MuscleGroup {
    Abs,
    Back,
    Biceps,
    Chest,
    Legs,
    Shoulders,
    Triceps,
}

impl MuscleGroup {
    /// Tag id as stored in `activity_ids`.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Back => "back",
            Self::Biceps => "biceps",
            Self::Chest => "chest",
            Self::Legs => "legs",
            Self::Shoulders => "shoulders",
            Self::Triceps => "triceps",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Abs => "Abs",
            Self::Back => "Back",
            Self::Biceps => "Biceps",
            Self::Chest => "Chest",
            Self::Legs => "Legs",
            Self::Shoulders => "Shoulders",
            Self::Triceps => "Triceps",
        }
    }

    /// Exact match on the tag id.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::iter().find(|group| group.id() == id)
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Lenient parse for user input: "Chest", " chest " and "CHEST" all work.
impl FromStr for MuscleGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::iter()
            .find(|group| group.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::iter().map(Self::id).collect();
                format!("Unknown muscle group '{}'. Expected one of: {}", wanted, known.join(", "))
            })
    }
}

/// Display label for a stored tag id. Tags outside the vocabulary show as-is.
pub fn muscle_label(tag: &str) -> &str {
    match MuscleGroup::from_id(tag) {
        Some(group) => group.label(),
        None => tag,
    }
}

/// One logged session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: LogId,
    pub date: NaiveDate,
    #[serde(default)]
    pub activity_ids: Vec<String>,
    #[serde(default)]
    pub is_cardio: bool,
    #[serde(default)]
    pub cardio_time: Option<f64>,
    #[serde(default)]
    pub cardio_distance: Option<f64>,
}

impl ActivityLog {
    /// Minutes per km, only when both metrics were logged on a cardio session.
    pub fn pace(&self) -> Option<f64> {
        if !self.is_cardio {
            return None;
        }
        match (self.cardio_time, self.cardio_distance) {
            (Some(time), Some(distance)) if distance > 0.0 => Some(time / distance),
            _ => None,
        }
    }
}

/// A record as produced by the form, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivityLog {
    pub date: NaiveDate,
    pub activity_ids: Vec<String>,
    pub is_cardio: bool,
    pub cardio_time: Option<f64>,
    pub cardio_distance: Option<f64>,
}
