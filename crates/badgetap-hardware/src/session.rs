//! One-shot UID extraction from a reader.
//!
//! A [`CardSession`] runs the full driver sequence for a single read:
//!
//! ```text
//! establish_context → connect → atr → begin_transaction → transmit(GET UID)
//!                                                              │
//!          release_context ← disconnect(reset) ← end(leave) ←──┘
//! ```
//!
//! Every resource acquired is released exactly once, in reverse order of
//! acquisition, before `read_uid` returns. Release failures are logged and
//! never replace the outcome of the read.

use crate::apdu::{ApduResponse, GET_UID};
use crate::error::HardwareError;
use crate::traits::{CardConnection, CardTransaction, HardwareChannel};
use crate::types::{Disposition, Protocols, ShareMode};
use badgetap_core::constants::RESPONSE_BUFFER_LEN;
use badgetap_core::{Atr, ReaderIdentity, Uid};
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors from a single UID read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The driver context could not be established.
    #[error("Could not establish reader context: {0}")]
    ContextFailed(#[source] HardwareError),

    /// Connecting to the card failed, typically because no card is present.
    #[error("Could not connect to reader {reader}: {source}")]
    ConnectFailed {
        reader: ReaderIdentity,
        #[source]
        source: HardwareError,
    },

    /// The exclusive transaction could not be started.
    #[error("Could not begin transaction: {0}")]
    TransactionFailed(#[source] HardwareError),

    /// The GET UID exchange failed.
    #[error("Transmit failed: {0}")]
    TransmitFailed(#[source] HardwareError),

    /// The card answered without any UID data.
    #[error("UID for ATR {atr} is not found")]
    UidNotFound { atr: Atr, status_word: u16 },
}

/// Reads card UIDs through a [`HardwareChannel`].
///
/// Each call to [`read_uid`](Self::read_uid) owns its own driver context
/// and connection, so independent reads may run concurrently.
#[derive(Debug)]
pub struct CardSession<C> {
    channel: Arc<C>,
}

impl<C> Clone for CardSession<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<C: HardwareChannel> CardSession<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self { channel }
    }

    /// The driver this session reads through.
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Read the UID of the card currently in `reader`.
    ///
    /// Blocks for the duration of the driver calls.
    ///
    /// # Errors
    ///
    /// Returns a [`ReadError`] naming the step that failed. An answer with
    /// no data is [`ReadError::UidNotFound`] carrying the card's ATR.
    pub fn read_uid(&self, reader: &ReaderIdentity) -> Result<Uid, ReadError> {
        let context = self
            .channel
            .establish_context()
            .map_err(ReadError::ContextFailed)?;

        let result = self.read_with_context(&context, reader);

        if let Err(e) = self.channel.release_context(context) {
            warn!(reader = %reader, error = %e, "Failed to release reader context");
        }
        result
    }

    fn read_with_context(
        &self,
        context: &C::Context,
        reader: &ReaderIdentity,
    ) -> Result<Uid, ReadError> {
        let mut connection = self
            .channel
            .connect(context, reader, ShareMode::Shared, Protocols::Any)
            .map_err(|source| ReadError::ConnectFailed {
                reader: reader.clone(),
                source,
            })?;

        let result = Self::read_with_connection(&mut connection, reader);

        if let Err(e) = self.channel.disconnect(connection, Disposition::Reset) {
            warn!(reader = %reader, error = %e, "Failed to disconnect from card");
        }
        result
    }

    fn read_with_connection(
        connection: &mut C::Connection,
        reader: &ReaderIdentity,
    ) -> Result<Uid, ReadError> {
        let atr = connection.atr().unwrap_or_else(|e| {
            debug!(reader = %reader, error = %e, "Card ATR unavailable");
            Atr::default()
        });

        let mut transaction = connection
            .begin_transaction()
            .map_err(ReadError::TransactionFailed)?;

        let exchange = transaction.transmit(&GET_UID.to_bytes(), RESPONSE_BUFFER_LEN);

        if let Err(e) = transaction.end(Disposition::Leave) {
            warn!(reader = %reader, error = %e, "Failed to end card transaction");
        }

        let response = ApduResponse::parse(&exchange.map_err(ReadError::TransmitFailed)?);
        debug!(
            reader = %reader,
            atr = %atr,
            sw1 = response.sw1(),
            sw2 = response.sw2(),
            len = response.data.len(),
            "GET UID answered"
        );

        if !response.has_data() {
            return Err(ReadError::UidNotFound {
                atr,
                status_word: response.status_word,
            });
        }

        Uid::from_bytes(&response.data).map_err(|e| {
            ReadError::TransmitFailed(HardwareError::invalid_data(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ChannelCall, ChannelOp, MockChannel, MockChannelHandle};
    use rstest::rstest;

    const ATR: [u8; 20] = [
        0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x6A,
    ];

    fn setup() -> (CardSession<MockChannel>, MockChannelHandle, ReaderIdentity) {
        let (channel, handle) = MockChannel::new();
        let reader = handle.add_reader("ACR122U").unwrap();
        (CardSession::new(Arc::new(channel)), handle, reader)
    }

    fn assert_released(handle: &MockChannelHandle) {
        assert_eq!(handle.open_transactions(), 0);
        assert_eq!(handle.open_connections(), 0);
        assert_eq!(handle.open_contexts(), 0);
    }

    #[test]
    fn test_read_uid_success() {
        let (session, handle, reader) = setup();
        handle.insert_card(&reader, ATR.to_vec(), &[0x04, 0xA1, 0xB2, 0xC3]);

        let uid = session.read_uid(&reader).unwrap();
        assert_eq!(uid.as_str(), "04A1B2C3");

        assert_eq!(
            handle.calls(),
            vec![
                ChannelCall::EstablishContext,
                ChannelCall::Connect {
                    reader: reader.clone()
                },
                ChannelCall::CardStatus,
                ChannelCall::BeginTransaction,
                ChannelCall::Transmit {
                    command: vec![0xFF, 0xCA, 0x00, 0x00, 0x00]
                },
                ChannelCall::EndTransaction {
                    disposition: Disposition::Leave
                },
                ChannelCall::Disconnect {
                    disposition: Disposition::Reset
                },
                ChannelCall::ReleaseContext,
            ]
        );
        assert_released(&handle);
    }

    #[test]
    fn test_empty_data_is_uid_not_found() {
        let (session, handle, reader) = setup();
        handle.insert_card_with_response(&reader, ATR.to_vec(), vec![0x90, 0x00]);

        let error = session.read_uid(&reader).unwrap_err();
        assert_eq!(
            error,
            ReadError::UidNotFound {
                atr: Atr::new(ATR.to_vec()),
                status_word: 0x9000,
            }
        );
        assert_eq!(
            error.to_string(),
            "UID for ATR 3B-8F-80-01-80-4F-0C-A0-00-00-03-06-03-00-01-00-00-00-00-6A is not found"
        );
        assert_released(&handle);
    }

    #[test]
    fn test_uid_not_found_with_unreadable_atr() {
        let (session, handle, reader) = setup();
        handle.insert_card_with_response(&reader, ATR.to_vec(), vec![0x6A, 0x81]);
        handle.fail(ChannelOp::CardStatus, HardwareError::communication("no status"));

        let error = session.read_uid(&reader).unwrap_err();
        assert_eq!(
            error,
            ReadError::UidNotFound {
                atr: Atr::default(),
                status_word: 0x6A81,
            }
        );
        assert_released(&handle);
    }

    #[test]
    fn test_context_failure_acquires_nothing() {
        let (session, handle, reader) = setup();
        handle.fail(ChannelOp::EstablishContext, HardwareError::context("no service"));

        let error = session.read_uid(&reader).unwrap_err();
        assert!(matches!(error, ReadError::ContextFailed(_)));
        assert_eq!(handle.calls(), vec![ChannelCall::EstablishContext]);
        assert_released(&handle);
    }

    #[test]
    fn test_connect_failure_releases_context() {
        let (session, handle, reader) = setup();

        let error = session.read_uid(&reader).unwrap_err();
        assert!(matches!(
            error,
            ReadError::ConnectFailed {
                source: HardwareError::NoCard { .. },
                ..
            }
        ));
        assert_eq!(
            handle.calls(),
            vec![
                ChannelCall::EstablishContext,
                ChannelCall::Connect {
                    reader: reader.clone()
                },
                ChannelCall::ReleaseContext,
            ]
        );
        assert_released(&handle);
    }

    #[test]
    fn test_transaction_failure_disconnects_then_releases() {
        let (session, handle, reader) = setup();
        handle.insert_card(&reader, ATR.to_vec(), &[0x04, 0xA1, 0xB2, 0xC3]);
        handle.fail(ChannelOp::BeginTransaction, HardwareError::transaction("busy"));

        let error = session.read_uid(&reader).unwrap_err();
        assert!(matches!(error, ReadError::TransactionFailed(_)));
        assert_eq!(
            &handle.calls()[3..],
            &[
                ChannelCall::BeginTransaction,
                ChannelCall::Disconnect {
                    disposition: Disposition::Reset
                },
                ChannelCall::ReleaseContext,
            ]
        );
        assert_released(&handle);
    }

    #[test]
    fn test_transmit_failure_runs_full_cleanup() {
        let (session, handle, reader) = setup();
        handle.insert_card(&reader, ATR.to_vec(), &[0x04, 0xA1, 0xB2, 0xC3]);
        handle.fail(ChannelOp::Transmit, HardwareError::transmit("card was removed"));

        let error = session.read_uid(&reader).unwrap_err();
        assert!(matches!(error, ReadError::TransmitFailed(_)));

        let calls = handle.calls();
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                ChannelCall::EndTransaction {
                    disposition: Disposition::Leave
                },
                ChannelCall::Disconnect {
                    disposition: Disposition::Reset
                },
                ChannelCall::ReleaseContext,
            ]
        );
        assert_released(&handle);
    }

    #[rstest]
    #[case(ChannelOp::EndTransaction)]
    #[case(ChannelOp::Disconnect)]
    #[case(ChannelOp::ReleaseContext)]
    fn test_cleanup_failure_does_not_mask_result(#[case] op: ChannelOp) {
        let (session, handle, reader) = setup();
        handle.insert_card(&reader, ATR.to_vec(), &[0x04, 0xA1, 0xB2, 0xC3]);
        handle.fail(op, HardwareError::communication("driver hiccup"));

        let uid = session.read_uid(&reader).unwrap();
        assert_eq!(uid.as_str(), "04A1B2C3");

        let calls = handle.calls();
        let count = |call: &ChannelCall| calls.iter().filter(|c| *c == call).count();
        assert_eq!(
            count(&ChannelCall::EndTransaction {
                disposition: Disposition::Leave
            }),
            1
        );
        assert_eq!(
            count(&ChannelCall::Disconnect {
                disposition: Disposition::Reset
            }),
            1
        );
        assert_eq!(count(&ChannelCall::ReleaseContext), 1);
        assert_released(&handle);
    }

    #[test]
    fn test_repeated_reads_without_card_are_independent() {
        let (session, handle, reader) = setup();

        for _ in 0..2 {
            assert!(matches!(
                session.read_uid(&reader),
                Err(ReadError::ConnectFailed { .. })
            ));
        }
        assert_eq!(
            handle
                .calls()
                .iter()
                .filter(|c| **c == ChannelCall::EstablishContext)
                .count(),
            2
        );
        assert_released(&handle);
    }

    #[test]
    fn test_unknown_reader() {
        let (session, handle, _) = setup();
        let ghost = ReaderIdentity::new("Ghost Reader").unwrap();

        let error = session.read_uid(&ghost).unwrap_err();
        assert!(matches!(
            error,
            ReadError::ConnectFailed {
                source: HardwareError::ReaderUnavailable { .. },
                ..
            }
        ));
        assert_released(&handle);
    }
}
