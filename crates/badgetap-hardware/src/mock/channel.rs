//! Mock reader channel for testing and development.
//!
//! This module provides a simulated driver whose readers and cards are
//! controlled programmatically through a [`MockChannelHandle`]. Every driver
//! call is recorded so tests can assert the exact claim/release sequence.

use crate::{
    HardwareError, Result,
    traits::{CardConnection, CardTransaction, HardwareChannel},
    types::{Disposition, Protocols, ShareMode, SlotState, SlotStatus},
};
use badgetap_core::{Atr, ReaderIdentity};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

/// Driver operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    ListReaders,
    EstablishContext,
    ReleaseContext,
    Connect,
    CardStatus,
    BeginTransaction,
    Transmit,
    EndTransaction,
    Disconnect,
    PollStatus,
}

/// A recorded driver call.
///
/// Status polls are counted rather than recorded, see
/// [`MockChannelHandle::poll_count`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    ListReaders,
    EstablishContext,
    ReleaseContext,
    Connect { reader: ReaderIdentity },
    CardStatus,
    BeginTransaction,
    Transmit { command: Vec<u8> },
    EndTransaction { disposition: Disposition },
    Disconnect { disposition: Disposition },
}

#[derive(Debug, Clone)]
struct MockCard {
    atr: Atr,
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockSlot {
    card: Option<MockCard>,
    unplugged: bool,
}

#[derive(Debug, Default)]
struct MockState {
    slots: BTreeMap<ReaderIdentity, MockSlot>,
    failures: HashMap<ChannelOp, HardwareError>,
    calls: Vec<ChannelCall>,
    open_contexts: usize,
    open_connections: usize,
    open_transactions: usize,
    polls: usize,
    last_poll_thread: Option<ThreadId>,
}

impl MockState {
    fn check(&self, op: ChannelOp) -> Result<()> {
        match self.failures.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn slot(&self, reader: &ReaderIdentity) -> Option<&MockSlot> {
        self.slots.get(reader).filter(|slot| !slot.unplugged)
    }
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock reader driver.
///
/// # Examples
///
/// ```
/// use badgetap_hardware::mock::MockChannel;
/// use badgetap_hardware::session::CardSession;
/// use std::sync::Arc;
///
/// let (channel, handle) = MockChannel::new();
/// let reader = handle.add_reader("ACR122U").unwrap();
/// handle.insert_card(&reader, vec![0x3B, 0x8F], &[0x04, 0xA1, 0xB2, 0xC3]);
///
/// let session = CardSession::new(Arc::new(channel));
/// let uid = session.read_uid(&reader).unwrap();
/// assert_eq!(uid.as_str(), "04A1B2C3");
/// ```
#[derive(Debug, Clone)]
pub struct MockChannel {
    state: SharedState,
}

impl MockChannel {
    /// Create a mock driver with no readers.
    ///
    /// Returns a tuple of (MockChannel, MockChannelHandle) where the handle
    /// controls readers and cards and inspects recorded calls.
    pub fn new() -> (Self, MockChannelHandle) {
        let state = SharedState::default();
        (
            Self {
                state: Arc::clone(&state),
            },
            MockChannelHandle { state },
        )
    }
}

/// Mock driver context.
#[derive(Debug)]
pub struct MockContext {
    _private: (),
}

/// Mock card connection.
#[derive(Debug)]
pub struct MockConnection {
    state: SharedState,
    reader: ReaderIdentity,
}

/// Mock exclusive transaction.
#[derive(Debug)]
pub struct MockTransaction<'a> {
    connection: &'a mut MockConnection,
}

impl HardwareChannel for MockChannel {
    type Context = MockContext;
    type Connection = MockConnection;

    fn list_readers(&self) -> Result<Vec<ReaderIdentity>> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::ListReaders);
        state.check(ChannelOp::ListReaders)?;

        Ok(state
            .slots
            .iter()
            .filter(|(_, slot)| !slot.unplugged)
            .map(|(reader, _)| reader.clone())
            .collect())
    }

    fn establish_context(&self) -> Result<MockContext> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::EstablishContext);
        state.check(ChannelOp::EstablishContext)?;

        state.open_contexts += 1;
        Ok(MockContext { _private: () })
    }

    fn release_context(&self, _context: MockContext) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::ReleaseContext);
        state.open_contexts = state.open_contexts.saturating_sub(1);
        state.check(ChannelOp::ReleaseContext)
    }

    fn connect(
        &self,
        _context: &MockContext,
        reader: &ReaderIdentity,
        _share_mode: ShareMode,
        _protocols: Protocols,
    ) -> Result<MockConnection> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::Connect {
            reader: reader.clone(),
        });
        state.check(ChannelOp::Connect)?;

        let slot = state
            .slot(reader)
            .ok_or_else(|| HardwareError::reader_unavailable(reader.as_str()))?;
        if slot.card.is_none() {
            return Err(HardwareError::no_card(reader.as_str()));
        }

        state.open_connections += 1;
        Ok(MockConnection {
            state: Arc::clone(&self.state),
            reader: reader.clone(),
        })
    }

    fn disconnect(&self, _connection: MockConnection, disposition: Disposition) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::Disconnect { disposition });
        state.open_connections = state.open_connections.saturating_sub(1);
        state.check(ChannelOp::Disconnect)
    }

    fn poll_status(
        &self,
        _context: &MockContext,
        readers: &[ReaderIdentity],
    ) -> Result<Vec<SlotStatus>> {
        let mut state = lock(&self.state);
        state.polls += 1;
        state.last_poll_thread = Some(std::thread::current().id());
        state.check(ChannelOp::PollStatus)?;

        Ok(readers
            .iter()
            .map(|reader| {
                let slot_state = match state.slot(reader) {
                    None => SlotState::Unavailable {
                        reason: format!("reader {reader} is not connected"),
                    },
                    Some(MockSlot {
                        card: Some(card), ..
                    }) => SlotState::Present {
                        atr: card.atr.clone(),
                    },
                    Some(_) => SlotState::Absent,
                };
                SlotStatus::new(reader.clone(), slot_state)
            })
            .collect())
    }
}

impl CardConnection for MockConnection {
    type Transaction<'a>
        = MockTransaction<'a>
    where
        Self: 'a;

    fn atr(&self) -> Result<Atr> {
        let mut state = lock(&self.state);
        state.calls.push(ChannelCall::CardStatus);
        state.check(ChannelOp::CardStatus)?;

        state
            .slot(&self.reader)
            .and_then(|slot| slot.card.as_ref())
            .map(|card| card.atr.clone())
            .ok_or_else(|| HardwareError::no_card(self.reader.as_str()))
    }

    fn begin_transaction(&mut self) -> Result<MockTransaction<'_>> {
        {
            let mut state = lock(&self.state);
            state.calls.push(ChannelCall::BeginTransaction);
            state.check(ChannelOp::BeginTransaction)?;
            state.open_transactions += 1;
        }
        Ok(MockTransaction { connection: self })
    }
}

impl CardTransaction for MockTransaction<'_> {
    fn transmit(&mut self, command: &[u8], max_len: usize) -> Result<Vec<u8>> {
        let mut state = lock(&self.connection.state);
        state.calls.push(ChannelCall::Transmit {
            command: command.to_vec(),
        });
        state.check(ChannelOp::Transmit)?;

        let response = state
            .slot(&self.connection.reader)
            .and_then(|slot| slot.card.as_ref())
            .map(|card| card.response.clone())
            .ok_or_else(|| HardwareError::transmit("card was removed"))?;

        if response.len() > max_len {
            return Err(HardwareError::transmit(format!(
                "response of {} bytes exceeds buffer of {} bytes",
                response.len(),
                max_len
            )));
        }
        Ok(response)
    }

    fn end(self, disposition: Disposition) -> Result<()> {
        let mut state = lock(&self.connection.state);
        state.calls.push(ChannelCall::EndTransaction { disposition });
        state.open_transactions = state.open_transactions.saturating_sub(1);
        state.check(ChannelOp::EndTransaction)
    }
}

/// Handle for controlling a mock reader driver.
///
/// Clones share the same simulated driver.
#[derive(Debug, Clone)]
pub struct MockChannelHandle {
    state: SharedState,
}

impl MockChannelHandle {
    /// Plug in a reader with an empty slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid reader name.
    pub fn add_reader(&self, name: &str) -> Result<ReaderIdentity> {
        let reader =
            ReaderIdentity::new(name).map_err(|e| HardwareError::invalid_data(e.to_string()))?;
        lock(&self.state)
            .slots
            .insert(reader.clone(), MockSlot::default());
        Ok(reader)
    }

    /// Simulate the reader being unplugged.
    pub fn unplug_reader(&self, reader: &ReaderIdentity) {
        if let Some(slot) = lock(&self.state).slots.get_mut(reader) {
            slot.unplugged = true;
        }
    }

    /// Plug a previously unplugged reader back in.
    pub fn replug_reader(&self, reader: &ReaderIdentity) {
        if let Some(slot) = lock(&self.state).slots.get_mut(reader) {
            slot.unplugged = false;
        }
    }

    /// Put a card answering GET UID with `uid` into the reader.
    pub fn insert_card(&self, reader: &ReaderIdentity, atr: impl Into<Atr>, uid: &[u8]) {
        let mut response = uid.to_vec();
        response.extend_from_slice(&[0x90, 0x00]);
        self.insert_card_with_response(reader, atr, response);
    }

    /// Put a card into the reader that answers any command with `response`.
    pub fn insert_card_with_response(
        &self,
        reader: &ReaderIdentity,
        atr: impl Into<Atr>,
        response: Vec<u8>,
    ) {
        let card = MockCard {
            atr: atr.into(),
            response,
        };
        lock(&self.state).slots.entry(reader.clone()).or_default().card = Some(card);
    }

    /// Take the card out of the reader.
    pub fn remove_card(&self, reader: &ReaderIdentity) {
        if let Some(slot) = lock(&self.state).slots.get_mut(reader) {
            slot.card = None;
        }
    }

    /// Make every subsequent `op` fail with `error` until cleared.
    pub fn fail(&self, op: ChannelOp, error: HardwareError) {
        lock(&self.state).failures.insert(op, error);
    }

    /// Stop failing `op`.
    pub fn clear_failure(&self, op: ChannelOp) {
        lock(&self.state).failures.remove(&op);
    }

    /// All recorded driver calls, oldest first.
    pub fn calls(&self) -> Vec<ChannelCall> {
        lock(&self.state).calls.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Contexts established and not yet released.
    pub fn open_contexts(&self) -> usize {
        lock(&self.state).open_contexts
    }

    /// Connections opened and not yet disconnected.
    pub fn open_connections(&self) -> usize {
        lock(&self.state).open_connections
    }

    /// Transactions begun and not yet ended.
    pub fn open_transactions(&self) -> usize {
        lock(&self.state).open_transactions
    }

    /// Number of status polls served.
    pub fn poll_count(&self) -> usize {
        lock(&self.state).polls
    }

    /// Thread that made the most recent status poll.
    pub fn last_poll_thread(&self) -> Option<ThreadId> {
        lock(&self.state).last_poll_thread
    }
}
