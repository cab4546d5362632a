//! Weekly recap assembly.
//!
//! Pulls the last week of daily records out of the log and hands them to the
//! extractor. An empty window is reported as [`RecapError::InsufficientData`]
//! before any oracle call is made, so the caller can tell "nothing to recap"
//! apart from "recap degraded to the fallback".

use crate::docs::DocumentLog;
use crate::error::RecapError;
use crate::extract::StructuredExtractor;
use crate::record::WeeklyRecap;

/// Days of history a recap covers.
pub const RECAP_WINDOW_DAYS: usize = 7;

pub struct RecapAggregator<'a> {
    log: &'a DocumentLog,
    extractor: &'a StructuredExtractor<'a>,
}

impl<'a> RecapAggregator<'a> {
    pub fn new(log: &'a DocumentLog, extractor: &'a StructuredExtractor<'a>) -> Self {
        Self { log, extractor }
    }

    /// The records the recap will cover. Checked before any oracle call so
    /// an empty week costs nothing and is reported distinctly.
    pub async fn window(&self) -> Result<Vec<crate::record::DailyRecord>, RecapError> {
        let records = self.log.read_recent_daily(RECAP_WINDOW_DAYS).await;
        if records.is_empty() {
            tracing::info!("no daily records in recap window");
            return Err(RecapError::InsufficientData);
        }
        Ok(records)
    }

    /// Summarize an already-read window.
    pub async fn recap(&self, records: &[crate::record::DailyRecord]) -> WeeklyRecap {
        tracing::info!(records = records.len(), "building weekly recap");
        self.extractor.extract_weekly(records).await
    }

    /// Read the window and summarize it in one step.
    pub async fn build(&self) -> Result<WeeklyRecap, RecapError> {
        let records = self.window().await?;
        Ok(self.recap(&records).await)
    }
}

/// Recap rendered for the chat channel, closing with the question that arms
/// the weekly reply flow.
pub fn format_recap_message(week_start: chrono::NaiveDate, recap: &WeeklyRecap) -> String {
    format!(
        "🗓️ Weekly Recap: Week of {week_start}\n\n\
         📈 Workout Count: {}\n\
         🍽️ General Eating Feeling: {}\n\
         😅 Slip-ups: {}\n\n\
         💭 Reflection: {}\n\n\
         How would you rate this week? What are your goals for next week?",
        recap.workout_count,
        recap.general_eating_feeling,
        recap.slip_ups,
        recap.suggested_reflection,
    )
}
