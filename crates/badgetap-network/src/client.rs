//! TCP client for the line-delimited JSON queue protocol.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!     │
//!     └─> TcpQueueConnector ──connect()──> TcpQueueClient ───(TCP)───> Queue
//!                                              │
//!                                              └─> LinesCodec (newline framing)
//! ```
//!
//! # Design Principles
//!
//! - **No automatic retry**: the dispatcher's retry policy decides
//! - **No connection pooling**: one short-lived connection per send
//!
//! # Timeout Handling
//!
//! Connect, write and acknowledgement wait each have the configured timeout
//! (default: 3000ms). Timeout errors are returned to the caller.

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::message::{OutboundMessage, QueueReply};
use crate::traits::{QueueClient, QueueConnector};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, trace, warn};

/// Longest reply line accepted from the queue.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Opens [`TcpQueueClient`] connections.
///
/// # Example
///
/// ```no_run
/// use badgetap_network::{OutboundMessage, QueueClient, QueueConfig, QueueConnector, TcpQueueConnector};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = TcpQueueConnector::new(QueueConfig::new("127.0.0.1:5672"))?;
///
/// let mut client = connector.connect().await?;
/// client.send(&OutboundMessage::new("04A1B2C3".parse()?)).await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpQueueConnector {
    config: QueueConfig,
}

impl TcpQueueConnector {
    /// Create a connector from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Config`] if the configuration is invalid.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        debug!("Creating queue connector for {}", config.endpoint);
        Ok(Self { config })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl QueueConnector for TcpQueueConnector {
    type Client = TcpQueueClient;

    async fn connect(&self) -> Result<TcpQueueClient, QueueError> {
        let mut client = TcpQueueClient::new(self.config.clone());
        client.connect().await?;
        Ok(client)
    }
}

/// Connection to the queue over TCP.
///
/// # Connection Lifecycle
///
/// 1. Create client with `new()`
/// 2. Connect with `connect()`
/// 3. Deliver messages with `send()`
/// 4. Close with `close()`
pub struct TcpQueueClient {
    /// Queue address
    endpoint: String,

    /// Framed TCP stream (None if not connected)
    framed: Option<Framed<TcpStream, LinesCodec>>,

    /// Timeout for all I/O operations
    timeout: Duration,
}

impl std::fmt::Debug for TcpQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpQueueClient")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TcpQueueClient {
    /// Create an unconnected client.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            framed: None,
            timeout: config.timeout,
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Connect to the queue
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Connection times out
    /// - Queue refuses the connection
    /// - The endpoint cannot be resolved
    pub async fn connect(&mut self) -> Result<(), QueueError> {
        info!("Connecting to queue at {}", self.endpoint);

        let stream = match tokio::time::timeout(
            self.timeout,
            TcpStream::connect(self.endpoint.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Connection failed: {}", e);
                return Err(QueueError::Connect {
                    endpoint: self.endpoint.clone(),
                    source: e,
                });
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", self.timeout_ms());
                return Err(QueueError::ConnectTimeout(self.timeout_ms()));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.framed = Some(Framed::new(
            stream,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ));
        debug!("Queue client connected");
        Ok(())
    }

    /// Send a message and wait for its acknowledgement
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Client is not connected
    /// - Write or acknowledgement wait times out
    /// - Connection is lost
    /// - The queue answers with anything but `accepted` for this message
    pub async fn send(&mut self, message: &OutboundMessage) -> Result<(), QueueError> {
        let timeout = self.timeout;
        let timeout_ms = self.timeout_ms();
        let line = message.to_line()?;

        trace!(message_id = %message.message_id, uid = %message.payload, "Sending message to queue");

        let framed = self.framed.as_mut().ok_or(QueueError::NotConnected)?;

        match tokio::time::timeout(timeout, framed.send(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Failed to send message: {}", e);
                return Err(QueueError::Codec(e.to_string()));
            }
            Err(_) => {
                warn!("Send timeout after {}ms", timeout_ms);
                return Err(QueueError::WriteTimeout(timeout_ms));
            }
        }

        let reply = match tokio::time::timeout(timeout, framed.next()).await {
            Ok(Some(Ok(line))) => line,
            Ok(Some(Err(e))) => {
                error!("Failed to read acknowledgement: {}", e);
                return Err(QueueError::Codec(e.to_string()));
            }
            Ok(None) => {
                warn!("Connection closed by queue");
                return Err(QueueError::ConnectionLost(
                    "Queue closed connection".to_string(),
                ));
            }
            Err(_) => {
                warn!("Acknowledgement timeout after {}ms", timeout_ms);
                return Err(QueueError::ReadTimeout(timeout_ms));
            }
        };

        let reply: QueueReply = serde_json::from_str(&reply)?;
        if reply.message_id != message.message_id || !reply.is_accepted() {
            return Err(QueueError::Rejected {
                message_id: reply.message_id.to_string(),
                status: reply.status,
            });
        }

        trace!(message_id = %message.message_id, "Message acknowledged");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Close the connection gracefully
    ///
    /// Idempotent. Flush and shutdown have a 500ms timeout each so a dead
    /// network cannot hang the caller.
    pub async fn close(&mut self) -> Result<(), QueueError> {
        if let Some(mut framed) = self.framed.take() {
            debug!("Closing connection to {}", self.endpoint);

            let flush_timeout = Duration::from_millis(500);
            match tokio::time::timeout(flush_timeout, SinkExt::<String>::flush(&mut framed)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error flushing during close: {}", e),
                Err(_) => warn!(
                    "Flush timeout during close ({}ms)",
                    flush_timeout.as_millis()
                ),
            }

            let mut stream = framed.into_inner();
            let shutdown_timeout = Duration::from_millis(500);
            match tokio::time::timeout(shutdown_timeout, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Error during shutdown: {}", e),
                Err(_) => warn!(
                    "Shutdown timeout during close ({}ms)",
                    shutdown_timeout.as_millis()
                ),
            }
        }

        Ok(())
    }
}

impl QueueClient for TcpQueueClient {
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), QueueError> {
        TcpQueueClient::send(self, message).await
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        TcpQueueClient::close(self).await
    }
}

impl Drop for TcpQueueClient {
    fn drop(&mut self) {
        if self.framed.is_some() {
            debug!("TcpQueueClient dropped while connected - connection will be closed");
        }
    }
}
