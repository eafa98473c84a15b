//! In-memory queue for testing and development.
//!
//! [`MockQueueConnector`] records every message handed to it and can be told
//! to fail a number of upcoming connects or sends. Clones share state, so a
//! test keeps one clone for inspection and gives the other to a dispatcher.

use crate::error::QueueError;
use crate::message::OutboundMessage;
use crate::traits::{QueueClient, QueueConnector};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MockQueueState {
    pending_connect_failures: usize,
    pending_send_failures: usize,
    connects: usize,
    closes: usize,
    attempted: Vec<OutboundMessage>,
    accepted: Vec<OutboundMessage>,
}

type SharedState = Arc<Mutex<MockQueueState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockQueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock queue connector.
///
/// # Example
///
/// ```
/// use badgetap_network::{Dispatcher, RetryPolicy};
/// use badgetap_network::mock::MockQueueConnector;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = MockQueueConnector::new();
/// let dispatcher = Dispatcher::new(queue.clone(), RetryPolicy::default());
///
/// dispatcher.send(&"04A1B2C3".parse().unwrap()).await.unwrap();
/// assert_eq!(queue.sent_messages()[0].payload.as_str(), "04A1B2C3");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockQueueConnector {
    state: SharedState,
}

impl MockQueueConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_connects(&self, count: usize) {
        lock(&self.state).pending_connect_failures = count;
    }

    /// Make the next `count` sends fail after connecting.
    pub fn fail_sends(&self, count: usize) {
        lock(&self.state).pending_send_failures = count;
    }

    /// Messages the queue acknowledged, oldest first.
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.state).accepted.clone()
    }

    /// Every message a send was attempted for, including failed ones.
    pub fn attempted_messages(&self) -> Vec<OutboundMessage> {
        lock(&self.state).attempted.clone()
    }

    /// Number of connection attempts.
    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    /// Number of `close` calls on connections.
    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }
}

impl QueueConnector for MockQueueConnector {
    type Client = MockQueueClient;

    async fn connect(&self) -> Result<MockQueueClient, QueueError> {
        let mut state = lock(&self.state);
        state.connects += 1;

        if state.pending_connect_failures > 0 {
            state.pending_connect_failures -= 1;
            return Err(QueueError::Connect {
                endpoint: "mock".to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }

        Ok(MockQueueClient {
            state: Arc::clone(&self.state),
            open: true,
        })
    }
}

/// Connection handed out by [`MockQueueConnector`].
#[derive(Debug)]
pub struct MockQueueClient {
    state: SharedState,
    open: bool,
}

impl QueueClient for MockQueueClient {
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), QueueError> {
        if !self.open {
            return Err(QueueError::NotConnected);
        }

        let mut state = lock(&self.state);
        state.attempted.push(message.clone());

        if state.pending_send_failures > 0 {
            state.pending_send_failures -= 1;
            return Err(QueueError::ConnectionLost(
                "Queue closed connection".to_string(),
            ));
        }

        state.accepted.push(message.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        if self.open {
            self.open = false;
            lock(&self.state).closes += 1;
        }
        Ok(())
    }
}
