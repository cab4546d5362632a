//! Structured records produced by extraction and reconstructed from the log.
//!
//! Absent fields are always the literal sentinel string, never an omitted or
//! empty field — both the document renderer and the re-parser key off the
//! sentinel text, so the invariant is load-bearing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel for a field the user did not mention.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Sentinel for a recap week with no slip-ups.
pub const NONE_REPORTED: &str = "None reported";

/// One day's normalized check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub workout: String,
    pub eating_feelings: String,
    /// 0-3 short goals, extraction order preserved for round-tripping.
    pub short_term_goals: Vec<String>,
}

impl DailyRecord {
    /// An empty record for `date` with every field at its sentinel.
    pub fn unspecified(date: NaiveDate) -> Self {
        Self {
            date,
            workout: NOT_SPECIFIED.to_string(),
            eating_feelings: NOT_SPECIFIED.to_string(),
            short_term_goals: Vec::new(),
        }
    }

    /// Whether the workout field describes a meaningful workout.
    ///
    /// Used by the local weekly fallback: sentinel, "none" and empty values
    /// do not count, case-insensitively.
    pub fn has_meaningful_workout(&self) -> bool {
        let workout = self.workout.to_lowercase();
        !matches!(workout.as_str(), "not specified" | "none" | "")
    }
}

/// One week's aggregated recap. Rendered and appended, never re-parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRecap {
    pub workout_count: u32,
    pub general_eating_feeling: String,
    pub slip_ups: String,
    pub suggested_reflection: String,
}

/// One day's stretch check. At most one logical entry per date; a duplicate
/// append for the same date shadows the earlier one by scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StretchEntry {
    pub date: NaiveDate,
    pub stretched: bool,
    pub raw_text: String,
}
