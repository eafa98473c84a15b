//! PC/SC reader driver.
//!
//! Thin adapter from the [`pcsc`] crate to [`HardwareChannel`]. Calls block
//! inside the PC/SC service; callers run them off the async runtime.

use crate::{
    HardwareError, Result,
    traits::{CardConnection, CardTransaction, HardwareChannel},
    types::{Disposition, Protocols, ShareMode, SlotState, SlotStatus},
};
use badgetap_core::{Atr, ReaderIdentity};
use std::ffi::CString;
use std::time::Duration;
use tracing::debug;

/// Readers are shared with other sessions on the machine.
const CONTEXT_SCOPE: ::pcsc::Scope = ::pcsc::Scope::System;

/// Reader driver backed by the system PC/SC service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcscChannel {
    _private: (),
}

impl PcscChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Open PC/SC card handle.
pub struct PcscConnection {
    card: ::pcsc::Card,
    reader: ReaderIdentity,
}

impl std::fmt::Debug for PcscConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscConnection")
            .field("reader", &self.reader)
            .finish()
    }
}

/// Exclusive PC/SC transaction.
pub struct PcscTransaction<'a>(::pcsc::Transaction<'a>);

fn reader_name(reader: &ReaderIdentity) -> Result<CString> {
    CString::new(reader.as_str()).map_err(|_| HardwareError::reader_unavailable(reader.as_str()))
}

fn map_connect_error(reader: &ReaderIdentity, error: ::pcsc::Error) -> HardwareError {
    match error {
        ::pcsc::Error::NoSmartcard | ::pcsc::Error::RemovedCard => {
            HardwareError::no_card(reader.as_str())
        }
        ::pcsc::Error::UnknownReader | ::pcsc::Error::ReaderUnavailable => {
            HardwareError::reader_unavailable(reader.as_str())
        }
        other => HardwareError::connect(reader.as_str(), other.to_string()),
    }
}

impl From<ShareMode> for ::pcsc::ShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Shared => ::pcsc::ShareMode::Shared,
            ShareMode::Exclusive => ::pcsc::ShareMode::Exclusive,
            ShareMode::Direct => ::pcsc::ShareMode::Direct,
        }
    }
}

impl From<Protocols> for ::pcsc::Protocols {
    fn from(protocols: Protocols) -> Self {
        match protocols {
            Protocols::Any => ::pcsc::Protocols::ANY,
            Protocols::T0 => ::pcsc::Protocols::T0,
            Protocols::T1 => ::pcsc::Protocols::T1,
            Protocols::Raw => ::pcsc::Protocols::RAW,
        }
    }
}

impl From<Disposition> for ::pcsc::Disposition {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::Leave => ::pcsc::Disposition::LeaveCard,
            Disposition::Reset => ::pcsc::Disposition::ResetCard,
            Disposition::Unpower => ::pcsc::Disposition::UnpowerCard,
            Disposition::Eject => ::pcsc::Disposition::EjectCard,
        }
    }
}

impl HardwareChannel for PcscChannel {
    type Context = ::pcsc::Context;
    type Connection = PcscConnection;

    fn list_readers(&self) -> Result<Vec<ReaderIdentity>> {
        let context = self.establish_context()?;
        let names = match context.list_readers_owned() {
            Ok(names) => names,
            Err(::pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => return Err(HardwareError::context(e.to_string())),
        };
        if let Err((_, e)) = context.release() {
            debug!(error = %e, "Failed to release enumeration context");
        }

        Ok(names
            .iter()
            .filter_map(|name| ReaderIdentity::new(name.to_string_lossy().into_owned()).ok())
            .collect())
    }

    fn establish_context(&self) -> Result<::pcsc::Context> {
        ::pcsc::Context::establish(CONTEXT_SCOPE)
            .map_err(|e| HardwareError::context(e.to_string()))
    }

    fn release_context(&self, context: ::pcsc::Context) -> Result<()> {
        context
            .release()
            .map_err(|(_, e)| HardwareError::context(e.to_string()))
    }

    fn connect(
        &self,
        context: &::pcsc::Context,
        reader: &ReaderIdentity,
        share_mode: ShareMode,
        protocols: Protocols,
    ) -> Result<PcscConnection> {
        let name = reader_name(reader)?;
        let card = context
            .connect(&name, share_mode.into(), protocols.into())
            .map_err(|e| map_connect_error(reader, e))?;

        Ok(PcscConnection {
            card,
            reader: reader.clone(),
        })
    }

    fn disconnect(&self, connection: PcscConnection, disposition: Disposition) -> Result<()> {
        let reader = connection.reader;
        connection
            .card
            .disconnect(disposition.into())
            .map_err(|(_, e)| HardwareError::connect(reader.as_str(), e.to_string()))
    }

    fn poll_status(
        &self,
        context: &::pcsc::Context,
        readers: &[ReaderIdentity],
    ) -> Result<Vec<SlotStatus>> {
        let mut states = readers
            .iter()
            .map(|reader| {
                reader_name(reader).map(|name| ::pcsc::ReaderState::new(name, ::pcsc::State::UNAWARE))
            })
            .collect::<Result<Vec<_>>>()?;

        match context.get_status_change(Duration::ZERO, &mut states) {
            Ok(()) | Err(::pcsc::Error::Timeout) => {}
            Err(e) => return Err(HardwareError::communication(e.to_string())),
        }

        Ok(readers
            .iter()
            .zip(&states)
            .map(|(reader, state)| {
                let event = state.event_state();
                let slot = if event.intersects(
                    ::pcsc::State::UNKNOWN | ::pcsc::State::UNAVAILABLE | ::pcsc::State::IGNORE,
                ) {
                    SlotState::Unavailable {
                        reason: format!("reader state {event:?}"),
                    }
                } else if event.contains(::pcsc::State::PRESENT) {
                    SlotState::Present {
                        atr: Atr::from(state.atr()),
                    }
                } else {
                    SlotState::Absent
                };
                SlotStatus::new(reader.clone(), slot)
            })
            .collect())
    }
}

impl CardConnection for PcscConnection {
    type Transaction<'a>
        = PcscTransaction<'a>
    where
        Self: 'a;

    fn atr(&self) -> Result<Atr> {
        self.card
            .get_attribute_owned(::pcsc::Attribute::AtrString)
            .map(Atr::from)
            .map_err(|e| HardwareError::communication(e.to_string()))
    }

    fn begin_transaction(&mut self) -> Result<PcscTransaction<'_>> {
        self.card
            .transaction()
            .map(PcscTransaction)
            .map_err(|e| HardwareError::transaction(e.to_string()))
    }
}

impl CardTransaction for PcscTransaction<'_> {
    fn transmit(&mut self, command: &[u8], max_len: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; max_len];
        self.0
            .transmit(command, &mut buffer)
            .map(<[u8]>::to_vec)
            .map_err(|e| HardwareError::transmit(e.to_string()))
    }

    fn end(self, disposition: Disposition) -> Result<()> {
        self.0
            .end(disposition.into())
            .map_err(|(_, e)| HardwareError::transaction(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_uses_system_scope() {
        assert!(matches!(CONTEXT_SCOPE, ::pcsc::Scope::System));
    }

    #[test]
    fn test_disposition_mapping() {
        assert!(matches!(
            ::pcsc::Disposition::from(Disposition::Leave),
            ::pcsc::Disposition::LeaveCard
        ));
        assert!(matches!(
            ::pcsc::Disposition::from(Disposition::Reset),
            ::pcsc::Disposition::ResetCard
        ));
    }

    #[test]
    fn test_connect_error_mapping() {
        let reader = ReaderIdentity::new("ACR122U").unwrap();
        assert!(matches!(
            map_connect_error(&reader, ::pcsc::Error::NoSmartcard),
            HardwareError::NoCard { .. }
        ));
        assert!(matches!(
            map_connect_error(&reader, ::pcsc::Error::UnknownReader),
            HardwareError::ReaderUnavailable { .. }
        ));
        assert!(matches!(
            map_connect_error(&reader, ::pcsc::Error::SharingViolation),
            HardwareError::Connect { .. }
        ));
    }
}
