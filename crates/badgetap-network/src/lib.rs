//! Queue delivery layer for badgetap
//!
//! This crate sends card UIDs to the message queue. It handles connection
//! management, newline-delimited JSON framing and the retry policy.
//!
//! # Components
//!
//! - **Dispatcher**: wraps a UID in a message and delivers it
//! - **TcpQueueConnector / TcpQueueClient**: TCP transport to the queue
//! - **MockQueueConnector**: in-memory queue for tests and simulation
//!
//! # Example
//!
//! ```no_run
//! use badgetap_network::{Dispatcher, QueueConfig, RetryPolicy, TcpQueueConnector};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QueueConfig::new("127.0.0.1:5672").timeout(Duration::from_millis(3000));
//! let dispatcher = Dispatcher::new(TcpQueueConnector::new(config)?, RetryPolicy::default());
//!
//! dispatcher.send(&"04A1B2C3".parse()?).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod error;
mod message;
pub mod mock;
mod traits;

pub use client::{TcpQueueClient, TcpQueueConnector};
pub use config::QueueConfig;
pub use dispatcher::{DispatchReceipt, Dispatcher, RetryPolicy};
pub use error::{DispatchError, QueueError};
pub use message::{LoginBody, OutboundMessage, QueueReply, STATUS_ACCEPTED};
pub use traits::{QueueClient, QueueConnector};
