//! Conversation control: which reply the bot is waiting for, and what to do
//! with it when it arrives.
//!
//! The bot is a prompt-driven state machine, not a chat agent. A scheduled or
//! manual trigger sends a prompt and arms the matching phase; the next
//! free-text message is consumed by that phase and the machine returns to
//! idle. Exactly one phase can be armed at a time, so a reply is never
//! ambiguous. Commands are handled in any phase without disturbing it, except
//! the trigger commands, which re-arm.
//!
//! Every flow ends back in a well-defined phase even when a step fails: the
//! error boundary resets to idle and apologizes rather than leaving the
//! machine stuck waiting.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;

use crate::channels::ChatChannel;
use crate::config::{RetryConfig, ScheduleConfig};
use crate::docs::DocumentLog;
use crate::error::{RecapError, SessionError};
use crate::extract::StructuredExtractor;
use crate::llm::Oracle;
use crate::recap::{format_recap_message, RecapAggregator};
use crate::record::DailyRecord;

/// Days of history embedded in the daily extraction prompt.
const HISTORY_WINDOW: usize = 3;

/// What the machine is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingDaily,
    AwaitingWeekly { week_start: NaiveDate },
    AwaitingStretch { date: NaiveDate },
}

impl Phase {
    fn describe(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingDaily => "awaiting daily check-in reply",
            Phase::AwaitingWeekly { .. } => "awaiting weekly reflection",
            Phase::AwaitingStretch { .. } => "awaiting stretch reply",
        }
    }
}

pub struct ConversationController {
    channel: Arc<dyn ChatChannel>,
    oracle: Arc<dyn Oracle>,
    log: Arc<DocumentLog>,
    stretch_log: Arc<DocumentLog>,
    retry: RetryConfig,
    schedule: ScheduleConfig,
    phase: Mutex<Phase>,
}

impl ConversationController {
    pub fn new(
        channel: Arc<dyn ChatChannel>,
        oracle: Arc<dyn Oracle>,
        log: Arc<DocumentLog>,
        stretch_log: Arc<DocumentLog>,
        retry: RetryConfig,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            channel,
            oracle,
            log,
            stretch_log,
            retry,
            schedule,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.phase.lock().await.clone()
    }

    async fn set_phase(&self, phase: Phase) {
        let mut current = self.phase.lock().await;
        tracing::debug!(from = current.describe(), to = phase.describe(), "phase change");
        *current = phase;
    }

    fn timezone(&self) -> Tz {
        self.schedule.timezone
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone()).date_naive()
    }

    /// Route one message from the user. Channel-level chat filtering has
    /// already happened; everything arriving here is from the user.
    pub async fn handle_message(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(command) = text.strip_prefix('/') {
            self.handle_command(command.split_whitespace().next().unwrap_or(""))
                .await;
            return;
        }

        let phase = self.phase().await;
        let (result, apology) = match phase {
            Phase::AwaitingDaily => (
                self.process_daily_reply(text).await,
                "Sorry, there was an error processing your response. Please try again later.",
            ),
            Phase::AwaitingWeekly { week_start } => (
                self.process_weekly_reply(week_start, text).await,
                "Sorry, there was an error saving your weekly response. Please try again later.",
            ),
            Phase::AwaitingStretch { date } => (
                self.process_stretch_reply(date, text).await,
                "Sorry, there was an error saving your stretch response. Please try again later.",
            ),
            Phase::Idle => {
                self.send_best_effort(
                    "I'm not currently expecting a response. Use /daily to start a daily check-in, \
                     /weekly for a weekly recap, or /stretch for a stretch check.",
                )
                .await;
                return;
            }
        };

        if let Err(error) = result {
            self.recover(Some(apology), error).await;
        }
    }

    async fn handle_command(&self, command: &str) {
        match command {
            "start" => {
                self.send_best_effort(
                    "Welcome to your Fitness Coach Bot! 🏋️‍♂️\n\n\
                     I'll check in with you every evening to ask about your workout, \
                     eating habits, and goals. I'll also provide weekly recaps on Sundays.\n\n\
                     Use /help to see available commands.",
                )
                .await;
            }
            "help" => self.send_best_effort(HELP_TEXT).await,
            "daily" => {
                if let Err(error) = self.send_daily_prompt().await {
                    self.recover(None, error).await;
                }
            }
            "weekly" => {
                if let Err(error) = self.send_weekly_recap().await {
                    self.recover(
                        Some(
                            "Sorry, there was an error generating your weekly recap. \
                             Please try again later.",
                        ),
                        error,
                    )
                    .await;
                }
            }
            "stretch" => {
                if let Err(error) = self.send_stretch_check(true).await {
                    self.recover(None, error).await;
                }
            }
            "status" => self.send_status().await,
            other => {
                tracing::debug!(command = other, "unknown command");
                self.send_best_effort("Unknown command. Use /help to see what I understand.")
                    .await;
            }
        }
    }

    /// Evening check-in prompt. Pulls yesterday's goals into the prompt when
    /// the log has them, then arms the daily phase.
    pub async fn send_daily_prompt(&self) -> Result<(), SessionError> {
        let yesterday = self.today().pred_opt().unwrap_or_else(|| self.today());
        let yesterday_goals = self
            .log
            .read_recent_daily(2)
            .await
            .into_iter()
            .find(|record| record.date == yesterday)
            .map(|record| record.short_term_goals)
            .unwrap_or_default();

        let mut prompt = String::from("Good evening! Time for your daily check-in 🌅\n\n");
        if !yesterday_goals.is_empty() {
            prompt.push_str(&format!(
                "Yesterday you planned: {}. How did it go?\n\n",
                yesterday_goals.join(", ")
            ));
        }
        prompt.push_str(
            "Please tell me about your day:\n\
             • How was your workout today?\n\
             • How did you feel about what you ate?\n\
             • Any goals for tomorrow / the next few days?",
        );

        self.send(&prompt).await?;
        self.set_phase(Phase::AwaitingDaily).await;
        tracing::info!("daily prompt sent");
        Ok(())
    }

    async fn process_daily_reply(&self, text: &str) -> Result<(), SessionError> {
        self.set_phase(Phase::Idle).await;
        self.send("Thanks! Processing your response... 🤖").await?;

        let history = self.recent_history().await;
        let extractor = StructuredExtractor::new(self.oracle.as_ref(), &self.retry);
        let record = extractor.extract_daily(self.today(), &history, text).await;

        self.log.append_daily(&record, text).await?;

        self.send(&daily_confirmation(&record)).await?;
        tracing::info!("daily reply processed");
        Ok(())
    }

    /// Weekly recap: assemble, send, log, then arm the reflection phase. An
    /// empty week is messaged and leaves the machine idle.
    pub async fn send_weekly_recap(&self) -> Result<(), SessionError> {
        let extractor = StructuredExtractor::new(self.oracle.as_ref(), &self.retry);
        let aggregator = RecapAggregator::new(&self.log, &extractor);

        let records = match aggregator.window().await {
            Ok(records) => records,
            Err(RecapError::InsufficientData) => {
                self.send(
                    "No daily summaries found for the past week. \
                     Start logging your daily check-ins!",
                )
                .await?;
                return Ok(());
            }
        };

        self.send("Preparing your weekly recap... 📊").await?;
        let recap = aggregator.recap(&records).await;

        let week_start = self.today() - chrono::Days::new(7);
        self.send(&format_recap_message(week_start, &recap)).await?;
        self.log.append_weekly(week_start, &recap).await?;

        self.set_phase(Phase::AwaitingWeekly { week_start }).await;
        tracing::info!("weekly recap sent");
        Ok(())
    }

    async fn process_weekly_reply(
        &self,
        week_start: NaiveDate,
        text: &str,
    ) -> Result<(), SessionError> {
        self.set_phase(Phase::Idle).await;
        self.log.append_weekly_response(week_start, text).await?;
        self.send(
            "Thanks for your weekly reflection! Your response has been saved. \
             Looking forward to supporting you in the coming week! 🌟",
        )
        .await?;
        tracing::info!("weekly reply processed");
        Ok(())
    }

    /// Stretch reminder. When triggered by the schedule it is conditional:
    /// skipped if yesterday's entry says the user stretched, or if today
    /// already has an entry. A manual /stretch always prompts.
    pub async fn send_stretch_check(&self, forced: bool) -> Result<(), SessionError> {
        let today = self.today();
        let yesterday = today.pred_opt().unwrap_or(today);
        let yesterday_entry = self.stretch_log.stretch_entry(yesterday).await;

        if !forced {
            if yesterday_entry.as_ref().is_some_and(|e| e.stretched) {
                tracing::info!(%yesterday, "stretched yesterday, skipping reminder");
                return Ok(());
            }
            if self.stretch_log.stretch_entry(today).await.is_some() {
                tracing::info!(%today, "stretch already logged today, skipping reminder");
                return Ok(());
            }
        }

        let mut prompt = String::from("🧘‍♂️ Stretch Reminder!\n\n");
        prompt.push_str(if yesterday_entry.is_some() {
            "I noticed you didn't stretch yesterday. "
        } else {
            "I don't have a record of you stretching yesterday. "
        });
        prompt.push_str(
            "Have you stretched today? Even 5-10 minutes can make a big difference!\n\n\
             Please reply with 'yes' or 'no' and let me know about your stretching today.",
        );

        self.send(&prompt).await?;
        self.set_phase(Phase::AwaitingStretch { date: today }).await;
        tracing::info!("stretch check sent");
        Ok(())
    }

    async fn process_stretch_reply(
        &self,
        date: NaiveDate,
        text: &str,
    ) -> Result<(), SessionError> {
        self.set_phase(Phase::Idle).await;

        let stretched = parse_stretch_reply(text);
        self.stretch_log.append_stretch(date, text, stretched).await?;

        let confirmation = if stretched {
            "Great job! 🎉 I've recorded that you stretched today. \
             Keep up the excellent work with your flexibility routine! 💪"
        } else {
            "Thanks for the update! 📝 I've recorded your response. \
             Remember, even a few minutes of stretching can help prevent stiffness \
             and improve your mobility. Consider adding it to your routine tomorrow! 🧘‍♂️"
        };
        self.send(confirmation).await?;
        tracing::info!(stretched, "stretch reply processed");
        Ok(())
    }

    async fn send_status(&self) {
        let now = Utc::now().with_timezone(&self.timezone());
        let phase = self.phase().await;
        let status = format!(
            "Current Status:\n\
             - Time: {}\n\
             - State: {}\n\
             - Daily prompt schedule: {} ({})\n\
             - Weekly recap schedule: {} ({})\n\
             - Stretch check schedule: {} ({})",
            now.format("%Y-%m-%d %H:%M:%S %Z"),
            phase.describe(),
            self.schedule.daily_cron,
            self.schedule.timezone,
            self.schedule.weekly_cron,
            self.schedule.timezone,
            self.schedule.stretch_cron,
            self.schedule.timezone,
        );
        self.send_best_effort(&status).await;
    }

    /// Free-text context for the daily extraction prompt: the last few raw
    /// entries, or a placeholder when the log is empty.
    async fn recent_history(&self) -> String {
        let entries = self.log.read_recent_raw(HISTORY_WINDOW).await;
        if entries.is_empty() {
            return "No recent history available.".to_string();
        }
        let mut history = String::from("Recent fitness history:\n");
        for entry in entries {
            history.push_str(&format!("- {entry}\n"));
        }
        history
    }

    async fn send(&self, text: &str) -> Result<(), SessionError> {
        self.channel.send(text).await?;
        Ok(())
    }

    /// Send where failure only warrants a log line, not a flow abort.
    async fn send_best_effort(&self, text: &str) {
        if let Err(error) = self.channel.send(text).await {
            tracing::warn!(%error, "failed to send message");
        }
    }

    /// Error boundary: reset to idle and, where a reply was being handled,
    /// apologize. The user's reply may be lost, but the machine never stays
    /// armed for a flow that already failed.
    async fn recover(&self, apology: Option<&str>, error: SessionError) {
        tracing::error!(%error, "flow failed, resetting to idle");
        self.set_phase(Phase::Idle).await;
        if let Some(apology) = apology {
            self.send_best_effort(apology).await;
        }
    }
}

/// An affirmative anywhere in the reply counts as having stretched.
fn parse_stretch_reply(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["yes", "yeah", "yep"].iter().any(|word| lower.contains(word))
}

fn daily_confirmation(record: &DailyRecord) -> String {
    format!(
        "Got it! Here's your summary:\n\n\
         🏋️ Workout: {}\n\
         🍎 Eating: {}\n\
         🎯 Goals: {}\n\n\
         Everything has been saved to your fitness log. Keep up the great work! 💪",
        record.workout,
        record.eating_feelings,
        record.short_term_goals.join(", "),
    )
}

const HELP_TEXT: &str = "Available commands:\n\
/start - Initialize the bot\n\
/help - Show this help message\n\
/daily - Trigger daily check-in manually\n\
/weekly - Trigger weekly recap manually\n\
/stretch - Trigger stretch check manually\n\
/status - Show current bot status\n\n\
The bot will automatically:\n\
- Send daily prompts every evening\n\
- Send weekly recaps on Sundays\n\
- Send stretch reminders in the evening (if needed)\n\
- Store all data in Google Docs";
