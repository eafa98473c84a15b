//! Error types for queue delivery.

use badgetap_core::Uid;
use thiserror::Error;

/// Errors that can occur while talking to the message queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue configuration is invalid; no connection was attempted.
    #[error("Invalid queue configuration: {0}")]
    Config(String),

    /// Client is not connected to the queue
    #[error("Not connected to queue")]
    NotConnected,

    /// Connection attempt failed
    #[error("Could not connect to queue at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Waiting for the acknowledgement timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Connection was lost during operation
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The queue refused the message
    #[error("Message {message_id} rejected by queue: {status}")]
    Rejected { message_id: String, status: String },

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Message could not be encoded or the reply decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    /// Whether another attempt could succeed.
    ///
    /// Configuration errors are permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Errors from [`Dispatcher::send`](crate::Dispatcher::send).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every attempt allowed by the retry policy failed.
    #[error("Could not send UID {uid} after {attempts} attempt(s): {source}")]
    SendFailed {
        uid: Uid,
        attempts: u32,
        #[source]
        source: QueueError,
    },
}

impl DispatchError {
    /// The error of the last attempt.
    pub fn last_error(&self) -> &QueueError {
        match self {
            Self::SendFailed { source, .. } => source,
        }
    }
}
