//! Inbound port. Front-ends (console, bot) call into the application.

use crate::domain::DomainError;

/// Input port: a front-end that owns the process until the user leaves.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the interactive front-end.
    async fn run(&self) -> Result<(), DomainError>;
}
