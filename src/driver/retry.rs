//! Bounded-attempts combinator.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ForceSensorError, Result};

/// One attempt of a retryable operation
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;

    /// Run attempt `number` (1-based)
    async fn attempt(&mut self, number: usize) -> Result<Self::Output>;
}

/// Run `operation` until it succeeds, at most `max_attempts` times
///
/// Retryable errors (see [`ForceSensorError::is_retryable`]) start the next
/// attempt. Any other error is returned straight away.
///
/// # Errors
///
/// Returns [`ForceSensorError::AttemptsExhausted`] once every attempt failed
/// with a retryable error.
pub async fn retry<A>(max_attempts: usize, operation: &mut A) -> Result<A::Output>
where
    A: Attempt + ?Sized,
{
    for number in 1..=max_attempts {
        match operation.attempt(number).await {
            Ok(output) => {
                if number > 1 {
                    debug!("Succeeded on attempt {}/{}", number, max_attempts);
                }
                return Ok(output);
            }
            Err(e) if e.is_retryable() => {
                debug!("Attempt {}/{} failed: {}", number, max_attempts, e);
            }
            Err(e) => return Err(e),
        }
    }

    warn!("Giving up after {} attempts", max_attempts);
    Err(ForceSensorError::AttemptsExhausted {
        attempts: max_attempts,
    })
}
