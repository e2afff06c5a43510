//! Testing utilities.
//!
//! `MockNarrator` returns scripted narration in order and records every
//! request so tests can assert on what would have been sent to the model.

use crate::narrator::{Narrator, NarratorError};
use async_trait::async_trait;
use claude::Message;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// What the narrator was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationRequest {
    pub system: String,
    pub history: Vec<Message>,
}

/// A narrator with scripted replies.
#[derive(Debug, Default)]
pub struct MockNarrator {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<NarrationRequest>>,
}

impl MockNarrator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<NarrationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<NarrationRequest> {
        self.requests.lock().await.last().cloned()
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn narrate(&self, system: &str, history: &[Message]) -> Result<String, NarratorError> {
        self.requests.lock().await.push(NarrationRequest {
            system: system.to_string(),
            history: history.to_vec(),
        });
        Ok(self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "The Game Master has no more scripted responses.".to_string()))
    }
}

/// A narrator that always fails.
#[derive(Debug, Default)]
pub struct FailingNarrator;

#[async_trait]
impl Narrator for FailingNarrator {
    async fn narrate(&self, _system: &str, _history: &[Message]) -> Result<String, NarratorError> {
        Err(NarratorError::Unavailable("scripted failure".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_then_fallback() {
        let mock = MockNarrator::new(["one", "two"]);
        let history = [Message::user("hi")];
        assert_eq!(mock.narrate("s", &history).await.unwrap(), "one");
        assert_eq!(mock.narrate("s", &history).await.unwrap(), "two");
        assert!(mock
            .narrate("s", &history)
            .await
            .unwrap()
            .contains("no more scripted"));
        assert_eq!(mock.requests().await.len(), 3);
        assert_eq!(mock.last_request().await.unwrap().history, history.to_vec());
    }
}
