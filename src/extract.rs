//! Structured extraction: free-text check-in replies in, typed records out.
//!
//! The oracle is asked for JSON and nothing else, but model output is never
//! trusted: fenced code blocks are stripped, the JSON is deserialized into
//! the target type, and any failure (malformed output, exhausted retries)
//! lands on a fixed fallback value. Extraction therefore never errors; a bad
//! day at the API degrades the summary, not the check-in flow.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::RetryConfig;
use crate::llm::Oracle;
use crate::record::{DailyRecord, WeeklyRecap, NOT_SPECIFIED};
use crate::retry::call_with_retry;

pub struct StructuredExtractor<'a> {
    oracle: &'a dyn Oracle,
    retry: &'a RetryConfig,
}

/// Shape the daily prompt asks for. Missing fields take the sentinels so a
/// partially valid response still yields a usable record.
#[derive(Deserialize)]
struct DailyPayload {
    #[serde(default = "not_specified")]
    workout: String,
    #[serde(default = "not_specified")]
    eating_feelings: String,
    #[serde(default)]
    short_term_goals: Vec<String>,
}

#[derive(Deserialize)]
struct WeeklyPayload {
    workout_count: u32,
    general_eating_feeling: String,
    slip_ups: String,
    suggested_reflection: String,
}

fn not_specified() -> String {
    NOT_SPECIFIED.to_string()
}

impl<'a> StructuredExtractor<'a> {
    pub fn new(oracle: &'a dyn Oracle, retry: &'a RetryConfig) -> Self {
        Self { oracle, retry }
    }

    /// Summarize one daily reply into a structured record.
    pub async fn extract_daily(
        &self,
        date: NaiveDate,
        history: &str,
        user_reply: &str,
    ) -> DailyRecord {
        let prompt = daily_prompt(history, user_reply);
        let payload = self.completed_payload::<DailyPayload>("daily summary", &prompt).await;

        match payload {
            Some(payload) => DailyRecord {
                date,
                workout: payload.workout,
                eating_feelings: payload.eating_feelings,
                short_term_goals: payload.short_term_goals,
            },
            None => daily_fallback(date),
        }
    }

    /// Summarize a week of daily records into a recap.
    pub async fn extract_weekly(&self, records: &[DailyRecord]) -> WeeklyRecap {
        let prompt = weekly_prompt(records);
        let payload = self.completed_payload::<WeeklyPayload>("weekly recap", &prompt).await;

        match payload {
            Some(payload) => WeeklyRecap {
                workout_count: payload.workout_count,
                general_eating_feeling: payload.general_eating_feeling,
                slip_ups: payload.slip_ups,
                suggested_reflection: payload.suggested_reflection,
            },
            None => weekly_fallback(records),
        }
    }

    /// One oracle round trip with retry, fence stripping, and JSON parsing.
    /// `None` means "use the fallback" regardless of what went wrong.
    async fn completed_payload<T: for<'de> Deserialize<'de>>(
        &self,
        op_name: &str,
        prompt: &str,
    ) -> Option<T> {
        let response = call_with_retry(self.retry, op_name, || self.oracle.complete(prompt)).await;

        let text = match response {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(op = op_name, %error, "oracle call failed, using fallback");
                return None;
            }
        };

        match serde_json::from_str::<T>(strip_code_fences(&text)) {
            Ok(payload) => {
                tracing::info!(op = op_name, "extraction succeeded");
                Some(payload)
            }
            Err(error) => {
                tracing::warn!(
                    op = op_name,
                    %error,
                    response = %text,
                    "oracle response was not valid JSON, using fallback"
                );
                None
            }
        }
    }
}

/// Fixed record returned when daily extraction fails.
pub fn daily_fallback(date: NaiveDate) -> DailyRecord {
    DailyRecord {
        date,
        workout: "Unable to process workout information".to_string(),
        eating_feelings: "Unable to process eating information".to_string(),
        short_term_goals: Vec::new(),
    }
}

/// Recap computed locally when weekly extraction fails. The workout count is
/// derived from the records on hand, the prose fields are fixed.
pub fn weekly_fallback(records: &[DailyRecord]) -> WeeklyRecap {
    WeeklyRecap {
        workout_count: records
            .iter()
            .filter(|r| r.has_meaningful_workout())
            .count() as u32,
        general_eating_feeling: "Mixed feelings about eating this week".to_string(),
        slip_ups: "Unable to analyze slip-ups".to_string(),
        suggested_reflection: "Keep up the great work and stay consistent!".to_string(),
    }
}

/// Drop a surrounding Markdown code fence, if any. Models asked for bare
/// JSON still wrap it in ```json fences often enough to matter.
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn daily_prompt(history: &str, user_reply: &str) -> String {
    format!(
        r#"You are a fitness accountability coach assistant. Analyze the user's daily check-in response and extract key information.

Recent context: {history}

User's response today: {user_reply}

Please provide a JSON response with the following structure:
{{
    "workout": "brief summary of their workout (or lack thereof)",
    "eating_feelings": "brief summary of how they felt about their eating",
    "short_term_goals": ["goal1", "goal2", "goal3"] // extract 1-3 specific goals they mentioned for tomorrow/next few days
}}

Guidelines:
- Be kind and encouraging in your summaries
- Keep workout and eating_feelings to 1-2 sentences each
- Extract concrete, actionable goals from their response
- If they didn't mention something, use "Not specified" rather than making assumptions
- Focus on their actual words and feelings

Respond with ONLY the JSON, no other text."#
    )
}

fn weekly_prompt(records: &[DailyRecord]) -> String {
    let mut summaries = String::new();
    for (i, record) in records.iter().enumerate() {
        summaries.push_str(&format!(
            "\nDay {}:\n- Workout: {}\n- Eating Feelings: {}\n- Goals: {}\n",
            i + 1,
            record.workout,
            record.eating_feelings,
            record.short_term_goals.join(", "),
        ));
    }

    format!(
        r#"You are a fitness accountability coach. Analyze the past week's daily summaries and provide a comprehensive weekly recap.

Daily summaries from this week:
{summaries}

Please provide a JSON response with the following structure:
{{
    "workout_count": number, // count of days where the user had a meaningful workout
    "general_eating_feeling": "brief summary of overall eating patterns/feelings this week",
    "slip_ups": "comma-separated list of foods/eating behaviors they struggled with, or 'None reported' if none",
    "suggested_reflection": "one encouraging sentence about their progress and/or a gentle suggestion for next week"
}}

Guidelines:
- Be encouraging and supportive in tone
- Count workouts only if they seem meaningful (not just "didn't work out" or similar)
- Focus on patterns across the week
- Keep slip_ups factual but non-judgmental
- Make the reflection personal and motivating

Respond with ONLY the JSON, no other text."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::error::LlmError;

    /// Oracle returning scripted responses in order; errors are retryable.
    struct ScriptedOracle {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .remove(0)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
    }

    fn transport_err() -> LlmError {
        LlmError::Transport("connection reset".to_string())
    }

    #[tokio::test]
    async fn daily_reply_extracts_structured_record() {
        let oracle = ScriptedOracle::replying(
            r#"{"workout": "Ran 5k", "eating_feelings": "Felt balanced", "short_term_goals": ["sleep earlier"]}"#,
        );
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor
            .extract_daily(date(), "no prior entries", "Ran 5k and ate well, want to sleep earlier")
            .await;

        assert_eq!(record.workout, "Ran 5k");
        assert_eq!(record.eating_feelings, "Felt balanced");
        assert_eq!(record.short_term_goals, vec!["sleep earlier".to_string()]);

        let prompt = oracle.last_prompt();
        assert!(prompt.contains("no prior entries"));
        assert!(prompt.contains("Ran 5k and ate well"));
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let oracle = ScriptedOracle::replying(
            "```json\n{\"workout\": \"Lifted\", \"eating_feelings\": \"Good\", \"short_term_goals\": []}\n```",
        );
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor.extract_daily(date(), "", "lifted today").await;
        assert_eq!(record.workout, "Lifted");
    }

    #[tokio::test]
    async fn malformed_json_falls_back_to_fixed_record() {
        let oracle = ScriptedOracle::replying("I went ahead and summarized it for you!");
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor.extract_daily(date(), "", "ran").await;
        assert_eq!(record, daily_fallback(date()));
        assert_eq!(record.workout, "Unable to process workout information");
        assert_eq!(record.eating_feelings, "Unable to process eating information");
        assert!(record.short_term_goals.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_take_sentinels() {
        let oracle = ScriptedOracle::replying(r#"{"workout": "Cycled 20k"}"#);
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor.extract_daily(date(), "", "cycled").await;
        assert_eq!(record.workout, "Cycled 20k");
        assert_eq!(record.eating_feelings, NOT_SPECIFIED);
        assert!(record.short_term_goals.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn daily_retries_then_succeeds() {
        let oracle = ScriptedOracle::new(vec![
            Err(transport_err()),
            Ok(r#"{"workout": "Swam", "eating_feelings": "Fine", "short_term_goals": []}"#.to_string()),
        ]);
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor.extract_daily(date(), "", "swam").await;
        assert_eq!(record.workout, "Swam");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back() {
        let oracle = ScriptedOracle::new(vec![
            Err(transport_err()),
            Err(transport_err()),
            Err(transport_err()),
        ]);
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let record = extractor.extract_daily(date(), "", "ran").await;
        assert_eq!(record, daily_fallback(date()));
    }

    #[tokio::test]
    async fn weekly_recap_extracts_structured_fields() {
        let oracle = ScriptedOracle::replying(
            r#"{"workout_count": 4, "general_eating_feeling": "Mostly balanced", "slip_ups": "late-night snacks", "suggested_reflection": "Strong week, keep the streak going"}"#,
        );
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let records = vec![DailyRecord {
            date: date(),
            workout: "Ran 5k".to_string(),
            eating_feelings: "Good".to_string(),
            short_term_goals: vec!["stretch".to_string()],
        }];
        let recap = extractor.extract_weekly(&records).await;

        assert_eq!(recap.workout_count, 4);
        assert_eq!(recap.slip_ups, "late-night snacks");

        let prompt = oracle.last_prompt();
        assert!(prompt.contains("Day 1:"));
        assert!(prompt.contains("- Workout: Ran 5k"));
        assert!(prompt.contains("- Goals: stretch"));
    }

    #[tokio::test]
    async fn weekly_fallback_counts_meaningful_workouts_locally() {
        let oracle = ScriptedOracle::replying("not json at all");
        let retry = fast_retry();
        let extractor = StructuredExtractor::new(&oracle, &retry);

        let mk = |workout: &str| DailyRecord {
            date: date(),
            workout: workout.to_string(),
            eating_feelings: "Fine".to_string(),
            short_term_goals: vec![],
        };
        let records = vec![mk("Ran 5k"), mk("Not specified"), mk("none"), mk(""), mk("Yoga")];

        let recap = extractor.extract_weekly(&records).await;
        assert_eq!(recap.workout_count, 2);
        assert_eq!(recap.general_eating_feeling, "Mixed feelings about eating this week");
        assert_eq!(recap.slip_ups, "Unable to analyze slip-ups");
        assert_eq!(
            recap.suggested_reflection,
            "Keep up the great work and stay consistent!"
        );
    }

    #[test]
    fn fence_stripping_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }
}
