//! Driven port gating outbound provider calls.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Raised when an admission wait is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The caller's cancellation fired before a permit was issued.
    #[error("rate limit wait cancelled")]
    Cancelled,
}

/// Permit issuer capping the rate of provider calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Wait for a permit or until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Cancelled`] when `cancel` fires first.
    async fn wait(&self, cancel: &CancellationToken) -> Result<(), AdmissionError>;

    /// Take a permit if one is immediately available.
    fn try_acquire(&self) -> bool;

    /// Permits currently available without waiting.
    fn available_tokens(&self) -> u32;
}

/// Fixture that admits every caller immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureAdmissionControl;

#[async_trait]
impl AdmissionControl for FixtureAdmissionControl {
    async fn wait(&self, cancel: &CancellationToken) -> Result<(), AdmissionError> {
        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }
        Ok(())
    }

    fn try_acquire(&self) -> bool {
        true
    }

    fn available_tokens(&self) -> u32 {
        u32::MAX
    }
}
