//! Append-only entry log over a document store.
//!
//! One `DocumentLog` wraps one document. Entries are inserted at the head,
//! newest first, so the freshest check-ins are on screen when the document
//! opens and recency queries are simple prefix scans. The document itself is
//! the only store: queries re-parse the rendered text, there is no database
//! alongside it.
//!
//! Writes are retried; an entry that still cannot be written is lost and
//! surfaced as an error. Reads never fail: any read problem degrades to "no
//! history", which callers treat as an empty log.

use std::ops::Range;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::RetryConfig;
use crate::docs::client::DocumentApi;
use crate::docs::template;
use crate::error::DocError;
use crate::record::{DailyRecord, StretchEntry, WeeklyRecap};
use crate::retry::call_with_retry;

pub struct DocumentLog {
    api: Arc<dyn DocumentApi>,
    doc_id: String,
    retry: RetryConfig,
}

impl DocumentLog {
    pub fn new(api: Arc<dyn DocumentApi>, doc_id: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            api,
            doc_id: doc_id.into(),
            retry,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Browser URL of the underlying document.
    pub fn doc_url(&self) -> String {
        format!("https://docs.google.com/document/d/{}/edit", self.doc_id)
    }

    /// Create a new log document and return a log over it.
    pub async fn create(
        api: Arc<dyn DocumentApi>,
        title: &str,
        retry: RetryConfig,
    ) -> Result<Self, DocError> {
        let doc_id = api.create_document(title).await?;
        let log = Self::new(api, doc_id, retry);
        log.append_block(&format!("{title}\n"), None).await?;
        tracing::info!(doc_id = %log.doc_id, "created log document");
        Ok(log)
    }

    /// Insert one rendered block at the head, with retry on transient
    /// failures.
    async fn append_block(
        &self,
        text: &str,
        heading: Option<Range<u32>>,
    ) -> Result<(), DocError> {
        call_with_retry(&self.retry, "document append", || {
            self.api.insert_at_head(&self.doc_id, text, heading.clone())
        })
        .await
    }

    async fn append_entry(&self, heading: &str, body: &str) -> Result<(), DocError> {
        self.append_block(
            &template::render_entry(heading, body),
            Some(template::heading_span(heading)),
        )
        .await?;
        tracing::info!(doc_id = %self.doc_id, heading, "appended log entry");
        Ok(())
    }

    /// Log a daily check-in: the user's raw reply plus the extracted summary.
    pub async fn append_daily(
        &self,
        record: &DailyRecord,
        raw_text: &str,
    ) -> Result<(), DocError> {
        self.append_entry(
            &template::daily_heading(record.date),
            &template::render_daily_body(record, raw_text),
        )
        .await
    }

    /// Log a weekly recap.
    pub async fn append_weekly(
        &self,
        week_start: NaiveDate,
        recap: &WeeklyRecap,
    ) -> Result<(), DocError> {
        self.append_entry(
            &template::weekly_heading(week_start),
            &template::render_weekly_body(recap),
        )
        .await
    }

    /// Log the user's reflection sent in answer to a weekly recap.
    pub async fn append_weekly_response(
        &self,
        week_start: NaiveDate,
        raw_text: &str,
    ) -> Result<(), DocError> {
        self.append_entry(
            &template::weekly_response_heading(week_start),
            &template::render_weekly_response_body(raw_text),
        )
        .await
    }

    /// Log a stretch check.
    pub async fn append_stretch(
        &self,
        date: NaiveDate,
        raw_text: &str,
        stretched: bool,
    ) -> Result<(), DocError> {
        self.append_entry(
            &template::stretch_heading(date),
            &template::render_stretch_body(raw_text, stretched),
        )
        .await
    }

    async fn read_text_or_empty(&self) -> String {
        match self.api.read_text(&self.doc_id).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(doc_id = %self.doc_id, %error, "document read failed, treating as empty");
                String::new()
            }
        }
    }

    /// Up to `limit` structured daily records, newest first. A read failure
    /// means no history, never an error.
    pub async fn read_recent_daily(&self, limit: usize) -> Vec<DailyRecord> {
        template::parse_daily_entries(&self.read_text_or_empty().await, limit)
    }

    /// Up to `limit` daily entries as raw text blocks, newest first. Used as
    /// free-text context for extraction prompts.
    pub async fn read_recent_raw(&self, limit: usize) -> Vec<String> {
        template::parse_raw_entries(&self.read_text_or_empty().await, limit)
    }

    /// The stretch entry for `date`, if one was logged. Most recent write
    /// wins when a date was logged twice.
    pub async fn stretch_entry(&self, date: NaiveDate) -> Option<StretchEntry> {
        template::parse_stretch_entry(&self.read_text_or_empty().await, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// In-memory document store. `fail_inserts` makes the next N inserts
    /// return a retryable transport error.
    #[derive(Default)]
    struct StubStore {
        text: Mutex<String>,
        fail_inserts: Mutex<u32>,
        insert_calls: Mutex<u32>,
        fail_reads: Mutex<bool>,
        last_heading: Mutex<Option<Range<u32>>>,
    }

    impl StubStore {
        fn with_text(text: &str) -> Self {
            Self {
                text: Mutex::new(text.to_string()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DocumentApi for StubStore {
        async fn read_text(&self, _doc_id: &str) -> Result<String, DocError> {
            if *self.fail_reads.lock().unwrap() {
                return Err(DocError::Transport("connection reset".to_string()));
            }
            Ok(self.text.lock().unwrap().clone())
        }

        async fn insert_at_head(
            &self,
            _doc_id: &str,
            text: &str,
            heading: Option<Range<u32>>,
        ) -> Result<(), DocError> {
            *self.insert_calls.lock().unwrap() += 1;
            let mut remaining = self.fail_inserts.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DocError::Transport("connection reset".to_string()));
            }
            *self.last_heading.lock().unwrap() = heading;
            let mut stored = self.text.lock().unwrap();
            stored.insert_str(0, text);
            Ok(())
        }

        async fn create_document(&self, _title: &str) -> Result<String, DocError> {
            Ok("doc-new".to_string())
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
        }
    }

    fn log_over(store: Arc<StubStore>) -> DocumentLog {
        DocumentLog::new(store, "doc-1", fast_retry())
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn record(d: u32, workout: &str) -> DailyRecord {
        DailyRecord {
            date: date(d),
            workout: workout.to_string(),
            eating_feelings: "Fine".to_string(),
            short_term_goals: vec![],
        }
    }

    #[tokio::test]
    async fn appended_entries_read_back_newest_first() {
        let store = Arc::new(StubStore::default());
        let log = log_over(store.clone());

        log.append_daily(&record(27, "rest day"), "nothing today")
            .await
            .unwrap();
        log.append_daily(&record(28, "5k run"), "ran this morning")
            .await
            .unwrap();

        let records = log.read_recent_daily(10).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(28));
        assert_eq!(records[0].workout, "5k run");
        assert_eq!(records[1].date, date(27));
    }

    #[tokio::test]
    async fn appended_entries_carry_a_heading_span() {
        let store = Arc::new(StubStore::default());
        let log = log_over(store.clone());

        log.append_daily(&record(28, "5k run"), "ran this morning")
            .await
            .unwrap();

        let span = store.last_heading.lock().unwrap().clone().unwrap();
        let stored = store.text.lock().unwrap().clone();
        assert_eq!(
            &stored[span.start as usize..span.end as usize],
            "Daily Check-in: 2026-08-28"
        );
    }

    #[tokio::test]
    async fn title_block_is_not_styled_as_heading() {
        let store = Arc::new(StubStore::default());
        DocumentLog::create(store.clone(), "Coach Log", fast_retry())
            .await
            .unwrap();

        assert!(store.last_heading.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn append_retries_transient_failures() {
        let store = Arc::new(StubStore::default());
        *store.fail_inserts.lock().unwrap() = 2;
        let log = log_over(store.clone());

        log.append_daily(&record(28, "swam"), "pool session")
            .await
            .unwrap();

        assert_eq!(*store.insert_calls.lock().unwrap(), 3);
        assert_eq!(log.read_recent_daily(1).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn append_gives_up_after_exhausted_attempts() {
        let store = Arc::new(StubStore::default());
        *store.fail_inserts.lock().unwrap() = 10;
        let log = log_over(store.clone());

        let err = log
            .append_daily(&record(28, "swam"), "pool session")
            .await
            .unwrap_err();

        assert!(matches!(err, DocError::Transport(_)));
        assert_eq!(*store.insert_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn read_failure_degrades_to_empty_history() {
        let store = Arc::new(StubStore::with_text("Daily Check-in: 2026-08-28\n---\n"));
        *store.fail_reads.lock().unwrap() = true;
        let log = log_over(store);

        assert!(log.read_recent_daily(10).await.is_empty());
        assert!(log.read_recent_raw(10).await.is_empty());
        assert_eq!(log.stretch_entry(date(28)).await, None);
    }

    #[tokio::test]
    async fn stretch_entries_round_trip_through_log() {
        let store = Arc::new(StubStore::default());
        let log = log_over(store);

        log.append_stretch(date(28), "did a full session", true)
            .await
            .unwrap();

        let entry = log.stretch_entry(date(28)).await.unwrap();
        assert!(entry.stretched);
        assert_eq!(entry.raw_text, "did a full session");
        assert_eq!(log.stretch_entry(date(27)).await, None);
    }

    #[tokio::test]
    async fn create_seeds_title_block() {
        let store = Arc::new(StubStore::default());
        let log = DocumentLog::create(store.clone(), "Coach Log", fast_retry())
            .await
            .unwrap();

        assert_eq!(log.doc_id(), "doc-new");
        assert!(store.text.lock().unwrap().starts_with("Coach Log"));
    }

    #[test]
    fn doc_url_points_at_editor() {
        let log = DocumentLog::new(Arc::new(StubStore::default()), "abc123", fast_retry());
        assert_eq!(
            log.doc_url(),
            "https://docs.google.com/document/d/abc123/edit"
        );
    }
}
