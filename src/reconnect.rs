//! Reconnect strategies.
//!
//! A [`ReconnectPolicy`] decides whether, and after how long, the client
//! opens a new transport after losing one. It is only consulted when the
//! client was started with a [`Connector`](crate::transport::Connector) and
//! the connection was lost (not ended by the server or by shutdown).
//!
//! Reconnecting never replays anything: the client re-sends its join intent
//! on the new transport and waits for the server's next board snapshot.

use std::fmt;
use std::time::Duration;

/// Decides the delay before each reconnect attempt.
pub trait ReconnectPolicy: Send + Sync + fmt::Debug {
    /// Delay before attempt number `attempt` (starting at 1), or `None` to
    /// give up and return to the join screen.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Never reconnect. A lost connection returns the user to the join screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Exponential backoff with a cap and a bounded number of attempts.
///
/// # Example
///
/// ```
/// use buzzer_client::reconnect::{ExponentialBackoff, ReconnectPolicy};
/// use std::time::Duration;
///
/// let policy = ExponentialBackoff::default();
/// assert_eq!(policy.next_delay(1), Some(Duration::from_millis(500)));
/// assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(6), None);
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first attempt.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Growth factor between attempts.
    pub multiplier: u32,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(10),
            multiplier: 2,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = self.multiplier.saturating_pow(attempt - 1);
        Some(self.initial.saturating_mul(factor).min(self.max))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn no_reconnect_never_retries() {
        assert_eq!(NoReconnect.next_delay(1), None);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ExponentialBackoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
            multiplier: 2,
            max_attempts: 4,
        };
        assert_eq!(policy.next_delay(0), None);
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(350)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_millis(350)));
        assert_eq!(policy.next_delay(5), None);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = ExponentialBackoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 10,
            max_attempts: 100,
        };
        assert_eq!(policy.next_delay(90), Some(Duration::from_secs(30)));
    }
}
