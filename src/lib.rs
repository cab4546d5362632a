//! Cadence: an accountability coach bot.
//!
//! Bridges one Telegram user to an LLM extraction pipeline and an
//! append-only Google Docs log. Scheduled triggers prompt for daily
//! check-ins, weekly recaps, and stretch reminders; free-text replies are
//! distilled to structured records and appended newest-first to the log,
//! which doubles as the query store.

pub mod channels;
pub mod config;
pub mod docs;
pub mod error;
pub mod extract;
pub mod llm;
pub mod recap;
pub mod record;
pub mod retry;
pub mod scheduler;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
