//! Smart-card reader access for the badgetap UID service.
//!
//! This crate wraps the reader driver behind the [`HardwareChannel`] trait
//! and builds the two reader-facing components on top of it:
//!
//! - [`ReaderMonitor`] watches a set of readers and turns slot state changes
//!   into [`CardEvent`]s for its subscribers.
//! - [`CardSession`] performs one UID read against a reader, claiming and
//!   releasing every driver resource in a fixed order.
//!
//! # Drivers
//!
//! [`MockChannel`](mock::MockChannel) simulates readers and cards and records
//! every driver call. The PC/SC driver lives behind the `pcsc` feature so the
//! crate builds on machines without the PC/SC development libraries.
//!
//! # Examples
//!
//! ```
//! use badgetap_hardware::mock::MockChannel;
//! use badgetap_hardware::CardSession;
//! use std::sync::Arc;
//!
//! let (channel, handle) = MockChannel::new();
//! let reader = handle.add_reader("ACR122U").unwrap();
//! handle.insert_card(&reader, vec![0x3B, 0x8F], &[0x04, 0xA1, 0xB2, 0xC3]);
//!
//! let session = CardSession::new(Arc::new(channel));
//! assert_eq!(session.read_uid(&reader).unwrap().as_str(), "04A1B2C3");
//! ```

pub mod apdu;
pub mod error;
pub mod mock;
pub mod monitor;
#[cfg(feature = "pcsc")]
pub mod pcsc_channel;
pub mod session;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use monitor::{
    CardEvent, CardEventHandler, MonitorConfig, MonitorError, ReaderMonitor, SubscriptionId,
};
pub use session::{CardSession, ReadError};
pub use traits::{CardConnection, CardTransaction, HardwareChannel};
pub use types::{Disposition, Protocols, ShareMode, SlotState, SlotStatus};

#[cfg(feature = "pcsc")]
pub use pcsc_channel::PcscChannel;
