//! Queue client abstraction.
//!
//! The [`Dispatcher`](crate::Dispatcher) only needs to open a connection,
//! send one message and close it again. These traits capture that, so the
//! TCP client can be swapped for [`MockQueueConnector`](crate::mock::MockQueueConnector)
//! in tests.

use crate::error::QueueError;
use crate::message::OutboundMessage;
use std::future::Future;

/// Factory for queue connections.
pub trait QueueConnector: Send + Sync {
    type Client: QueueClient;

    /// Open a new connection to the queue.
    fn connect(&self) -> impl Future<Output = Result<Self::Client, QueueError>> + Send;
}

/// An open queue connection.
pub trait QueueClient: Send {
    /// Send one message and wait for the queue to acknowledge it.
    fn send(
        &mut self,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Close the connection. Calling it more than once is harmless.
    fn close(&mut self) -> impl Future<Output = Result<(), QueueError>> + Send;
}
