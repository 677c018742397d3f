//! Console channel. Implements ChannelPort with inquire prompts on the terminal.

use crate::domain::DomainError;
use crate::ports::ChannelPort;
use crossterm::style::Stylize;
use inquire::InquireError;
use inquire::Text;

const PROMPT: &str = ">";

/// Prints messages to stdout and reads answers with a text prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Cancel/interrupt mean the human left; anything else is worth another try.
pub(crate) fn map_inquire_error(e: InquireError) -> DomainError {
    match e {
        InquireError::OperationCanceled
        | InquireError::OperationInterrupted
        | InquireError::NotTTY => DomainError::ChannelClosed(e.to_string()),
        other => DomainError::Channel(other.to_string()),
    }
}

#[async_trait::async_trait]
impl ChannelPort for ConsoleChannel {
    async fn send(&self, text: &str) -> Result<(), DomainError> {
        println!("{}", text.cyan());
        Ok(())
    }

    async fn receive(&self) -> Result<String, DomainError> {
        // inquire blocks on the terminal; keep it off the runtime workers.
        tokio::task::spawn_blocking(|| Text::new(PROMPT).prompt())
            .await
            .map_err(|e| DomainError::Channel(e.to_string()))?
            .map_err(map_inquire_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_closes_channel() {
        assert!(matches!(
            map_inquire_error(InquireError::OperationCanceled),
            DomainError::ChannelClosed(_)
        ));
        assert!(matches!(
            map_inquire_error(InquireError::Custom("boom".into())),
            DomainError::Channel(_)
        ));
    }
}
