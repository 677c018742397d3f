//! Scripted channel for testing without a human on the other end.
//!
//! Replays queued replies and records every message sent.

use crate::domain::DomainError;
use crate::ports::ChannelPort;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Channel that answers from a script.
///
/// When the script runs out, `receive` returns `DomainError::ChannelClosed`.
#[derive(Default)]
pub struct ScriptedChannel {
    replies: Mutex<VecDeque<Result<String, DomainError>>>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    /// Create a channel answering with the given lines in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Create a channel answering with lines or read failures.
    pub fn with_results(replies: Vec<Result<String, DomainError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ChannelPort for ScriptedChannel {
    async fn send(&self, text: &str) -> Result<(), DomainError> {
        debug!(text, "[SCRIPTED] send");
        self.sent
            .lock()
            .map_err(|e| DomainError::Channel(e.to_string()))?
            .push(text.to_string());
        Ok(())
    }

    async fn receive(&self) -> Result<String, DomainError> {
        let next = self
            .replies
            .lock()
            .map_err(|e| DomainError::Channel(e.to_string()))?
            .pop_front();
        next.unwrap_or_else(|| Err(DomainError::ChannelClosed("script exhausted".into())))
    }
}
