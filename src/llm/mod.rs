//! Text-generation oracle used for structured extraction.
//!
//! The oracle is treated as untrusted: the extractor assumes its output may
//! be malformed and applies deterministic fallbacks. Exactly one backend is
//! supported (the Anthropic Messages API); the trait seam exists so tests
//! can substitute a stub.

mod anthropic;

pub use anthropic::AnthropicProvider;

use async_trait::async_trait;

use crate::error::LlmError;

/// A text-generation service: prompt in, raw text out.
///
/// One call is one attempt — retry classification lives in [`LlmError`]
/// and the loop in [`crate::retry`], applied at the call sites.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete a single user-role prompt, returning the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// The model identifier requests are issued with.
    fn model_name(&self) -> &str;
}
