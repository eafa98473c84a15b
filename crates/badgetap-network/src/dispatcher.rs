//! UID delivery to the message queue.
//!
//! The [`Dispatcher`] wraps a UID in an [`OutboundMessage`], opens a fresh
//! queue connection for each attempt and closes it again whatever the
//! outcome. Retries follow a [`RetryPolicy`]; the default sends once.

use crate::error::{DispatchError, QueueError};
use crate::message::OutboundMessage;
use crate::traits::{QueueClient, QueueConnector};
use badgetap_core::Uid;
use chrono::{DateTime, Local};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often and how patiently a message is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Values below 1 count as 1.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_backoff: Duration,

    /// Factor applied to the delay after each failed attempt.
    pub multiplier: f64,

    /// Upper bound for the delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Send once, never retry.
    pub fn no_retry() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    ///
    /// # Example
    ///
    /// ```
    /// use badgetap_network::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default()
    ///     .max_attempts(5)
    ///     .initial_backoff(Duration::from_millis(100));
    /// assert_eq!(policy.backoff(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff(2), Duration::from_millis(200));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let max_millis = self.max_backoff.as_millis() as f64;
        Duration::from_millis(millis.min(max_millis) as u64)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Proof of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub uid: Uid,
    pub message_id: Uuid,
    pub sent_at: DateTime<Local>,
    /// Attempts it took, starting at 1.
    pub attempts: u32,
}

/// Sends UIDs to the queue.
///
/// # Example
///
/// ```no_run
/// use badgetap_network::{Dispatcher, QueueConfig, RetryPolicy, TcpQueueConnector};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = TcpQueueConnector::new(QueueConfig::new("127.0.0.1:5672"))?;
/// let dispatcher = Dispatcher::new(connector, RetryPolicy::default());
///
/// let receipt = dispatcher.send(&"04A1B2C3".parse()?).await?;
/// println!("UID {} successfully sent at {}", receipt.uid, receipt.sent_at);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher<Q> {
    connector: Q,
    policy: RetryPolicy,
}

impl<Q: QueueConnector> Dispatcher<Q> {
    pub fn new(connector: Q, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn connector(&self) -> &Q {
        &self.connector
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver `uid` to the queue.
    ///
    /// All attempts carry the same message id.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SendFailed`] with the last error once the
    /// retry policy is exhausted or the error is not retryable.
    pub async fn send(&self, uid: &Uid) -> Result<DispatchReceipt, DispatchError> {
        let message = OutboundMessage::new(uid.clone());
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            match self.attempt(&message).await {
                Ok(()) => {
                    let receipt = DispatchReceipt {
                        uid: uid.clone(),
                        message_id: message.message_id,
                        sent_at: Local::now(),
                        attempts: attempt,
                    };
                    info!(
                        uid = %uid,
                        message_id = %message.message_id,
                        attempts = attempt,
                        "UID dispatched"
                    );
                    return Ok(receipt);
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        uid = %uid,
                        message_id = %message.message_id,
                        attempt,
                        error = %e,
                        "Send failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        uid = %uid,
                        message_id = %message.message_id,
                        attempts = attempt,
                        error = %e,
                        "Send failed"
                    );
                    return Err(DispatchError::SendFailed {
                        uid: uid.clone(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<(), QueueError> {
        let mut client = self.connector.connect().await?;
        let result = client.send(message).await;

        if let Err(e) = client.close().await {
            debug!(message_id = %message.message_id, error = %e, "Failed to close queue connection");
        }
        result
    }
}
