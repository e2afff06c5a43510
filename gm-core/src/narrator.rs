//! The boundary to the hosted model that writes the story.

use crate::config::NarratorConfig;
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("Claude API error: {0}")]
    Claude(#[from] claude::Error),

    #[error("Narration unavailable: {0}")]
    Unavailable(String),
}

/// Turns a system prompt and conversation into the next piece of narration.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, system: &str, history: &[Message]) -> Result<String, NarratorError>;
}

#[async_trait]
impl<N: Narrator + ?Sized> Narrator for Arc<N> {
    async fn narrate(&self, system: &str, history: &[Message]) -> Result<String, NarratorError> {
        (**self).narrate(system, history).await
    }
}

/// Narration from Claude.
pub struct ClaudeNarrator {
    client: Claude,
    config: NarratorConfig,
}

impl ClaudeNarrator {
    pub fn new(client: Claude, config: NarratorConfig) -> Self {
        let client = client.with_model(config.model.clone());
        Self { client, config }
    }

    /// Build from `ANTHROPIC_API_KEY`.
    pub fn from_env(config: NarratorConfig) -> Result<Self, NarratorError> {
        Ok(Self::new(Claude::from_env()?, config))
    }
}

#[async_trait]
impl Narrator for ClaudeNarrator {
    async fn narrate(&self, system: &str, history: &[Message]) -> Result<String, NarratorError> {
        let request = Request::new(history.to_vec())
            .with_system(system)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p);

        let response = self.client.complete(request).await?;
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Narration received"
        );
        Ok(response.text)
    }
}

/// Stand-in used when no API key is configured.
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn narrate(&self, _system: &str, _history: &[Message]) -> Result<String, NarratorError> {
        Err(NarratorError::Unavailable(
            "set ANTHROPIC_API_KEY to enable narration".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_narrator_errors() {
        let err = OfflineNarrator
            .narrate("system", &[Message::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, NarratorError::Unavailable(_)));
    }
}
