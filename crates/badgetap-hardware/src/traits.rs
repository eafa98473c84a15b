//! Reader driver trait definitions.
//!
//! These traits are the contract between the card session / reader monitor
//! and the smart-card driver. They mirror the PC/SC call sequence:
//!
//! ```text
//! establish_context ─► connect ─► begin_transaction ─► transmit
//!                                                         │
//! release_context ◄── disconnect ◄── end_transaction ◄────┘
//! ```
//!
//! Every acquired resource is handed back by value (`release_context`,
//! `disconnect`, [`CardTransaction::end`]), so a resource can be released
//! at most once. Driver calls block until the driver returns.

use crate::error::Result;
use crate::types::{Disposition, Protocols, ShareMode, SlotStatus};
use badgetap_core::{Atr, ReaderIdentity};

/// Access to a smart-card reader driver.
///
/// Implementations: [`MockChannel`](crate::mock::MockChannel) for tests and
/// simulation, and `PcscChannel` (feature `pcsc`) for real readers.
///
/// # Examples
///
/// ```
/// use badgetap_hardware::mock::MockChannel;
/// use badgetap_hardware::traits::HardwareChannel;
///
/// let (channel, handle) = MockChannel::new();
/// handle.add_reader("ACR122U").unwrap();
///
/// let readers = channel.list_readers().unwrap();
/// assert_eq!(readers.len(), 1);
/// ```
pub trait HardwareChannel: Send + Sync {
    /// Driver session context.
    type Context: Send;

    /// Open connection to a card in a reader.
    type Connection: CardConnection;

    /// Enumerate the readers known to the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver service cannot be reached.
    fn list_readers(&self) -> Result<Vec<ReaderIdentity>>;

    /// Establish a fresh driver context.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::Context`](crate::HardwareError::Context) if
    /// the driver service cannot be reached.
    fn establish_context(&self) -> Result<Self::Context>;

    /// Release a context obtained from [`establish_context`](Self::establish_context).
    ///
    /// # Errors
    ///
    /// Returns an error if the driver reports a failure; the context is
    /// gone either way.
    fn release_context(&self, context: Self::Context) -> Result<()>;

    /// Connect to the card in `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reader is unknown or unplugged
    /// - No card is present
    /// - The card is held exclusively by another process
    fn connect(
        &self,
        context: &Self::Context,
        reader: &ReaderIdentity,
        share_mode: ShareMode,
        protocols: Protocols,
    ) -> Result<Self::Connection>;

    /// Close a connection, leaving the card in the given state.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver reports a failure; the connection is
    /// gone either way.
    fn disconnect(&self, connection: Self::Connection, disposition: Disposition) -> Result<()>;

    /// Report the current card state of each reader.
    ///
    /// The returned vector has one entry per requested reader, in order.
    /// Readers the driver does not know are reported as
    /// [`SlotState::Unavailable`](crate::types::SlotState::Unavailable).
    ///
    /// # Errors
    ///
    /// Returns an error if the status query itself fails (e.g. the driver
    /// service stopped).
    fn poll_status(
        &self,
        context: &Self::Context,
        readers: &[ReaderIdentity],
    ) -> Result<Vec<SlotStatus>>;
}

/// An open connection to a card.
pub trait CardConnection: Send {
    /// Exclusive transaction borrowed from this connection.
    type Transaction<'a>: CardTransaction
    where
        Self: 'a;

    /// Answer To Reset of the connected card.
    ///
    /// # Errors
    ///
    /// Returns an error if the card status cannot be read.
    fn atr(&self) -> Result<Atr>;

    /// Claim exclusive access to the card.
    ///
    /// # Errors
    ///
    /// Returns an error if another process holds the card or it was removed.
    fn begin_transaction(&mut self) -> Result<Self::Transaction<'_>>;
}

/// An exclusive transaction on a card connection.
pub trait CardTransaction {
    /// Send a command APDU and return the raw response (data + status word).
    ///
    /// `max_len` is the size of the receive buffer handed to the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the response does not fit.
    fn transmit(&mut self, command: &[u8], max_len: usize) -> Result<Vec<u8>>;

    /// End the transaction, leaving the card in the given state.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver reports a failure; the transaction is
    /// over either way.
    fn end(self, disposition: Disposition) -> Result<()>;
}
