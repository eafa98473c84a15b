//! Common types shared by reader channel implementations.
//!
//! This module defines the connection parameters passed to the driver
//! (share mode, protocols, disposition) and the per-slot status reported
//! while monitoring.

use badgetap_core::{Atr, ReaderIdentity};
use serde::{Deserialize, Serialize};

/// How a reader connection is shared with other processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareMode {
    /// Other applications may connect to the same card.
    Shared,

    /// No other application may connect while this connection is open.
    Exclusive,

    /// Direct access to the reader without a card.
    Direct,
}

/// Card protocols accepted when connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocols {
    /// Any protocol the card and reader agree on.
    Any,

    /// T=0 only.
    T0,

    /// T=1 only.
    T1,

    /// Raw protocol.
    Raw,
}

/// What happens to the card when a transaction or connection ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Leave the card as is.
    Leave,

    /// Warm reset of the card.
    Reset,

    /// Power the card down.
    Unpower,

    /// Eject the card, if the reader supports it.
    Eject,
}

/// Card state of a single reader slot as reported by one status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    /// Reader is available and holds no card.
    Absent,

    /// A card is present. The ATR may be empty.
    Present { atr: Atr },

    /// Reader is unknown, unplugged, or otherwise unusable.
    Unavailable { reason: String },
}

impl SlotState {
    /// Check if a card is present.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// Status of one reader slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    /// Reader this status belongs to.
    pub reader: ReaderIdentity,

    /// Observed card state.
    pub state: SlotState,
}

impl SlotStatus {
    /// Create a new slot status.
    pub fn new(reader: ReaderIdentity, state: SlotState) -> Self {
        Self { reader, state }
    }
}
