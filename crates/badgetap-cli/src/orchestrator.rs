//! Glue between reader events, UID extraction and queue delivery.
//!
//! # Architecture
//!
//! ```text
//! ReaderMonitor task ──on_event──► EventSink ──mpsc──► worker task
//!                                                        │
//!                             spawn_blocking(read_uid) ◄─┤
//!                                    Dispatcher::send ◄──┘
//! ```
//!
//! The monitor's handler only enqueues, so a slow card exchange or queue
//! never delays detection. The worker handles events one at a time in
//! arrival order.

use badgetap_core::{Atr, ReaderIdentity, Uid};
use badgetap_hardware::{CardEvent, CardEventHandler, CardSession, HardwareChannel, ReadError};
use badgetap_network::{DispatchError, DispatchReceipt, Dispatcher, QueueConnector};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the event queue between monitor and worker.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Result of handling one card tap.
#[derive(Debug)]
pub enum TapOutcome {
    /// The UID reached the queue.
    Sent(DispatchReceipt),

    /// The card answered without a UID; nothing was dispatched.
    UidNotFound { reader: ReaderIdentity, atr: Atr },

    /// The card could not be read; nothing was dispatched.
    ReadFailed {
        reader: ReaderIdentity,
        error: ReadError,
    },

    /// The UID was read but could not be delivered.
    SendFailed { uid: Uid, error: DispatchError },

    /// The blocking read task did not complete.
    Interrupted { reader: ReaderIdentity },
}

impl TapOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Monitor subscriber that forwards events to the orchestrator worker.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CardEvent>,
}

impl CardEventHandler for EventSink {
    fn on_event(&self, event: &CardEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "Event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Orchestrator stopped, dropping event");
            }
        }
    }
}

/// Reads and dispatches the UID of every inserted card.
pub struct Orchestrator<C, Q> {
    session: CardSession<C>,
    dispatcher: Dispatcher<Q>,
}

impl<C, Q> Orchestrator<C, Q>
where
    C: HardwareChannel + 'static,
    Q: QueueConnector + 'static,
{
    pub fn new(session: CardSession<C>, dispatcher: Dispatcher<Q>) -> Self {
        Self {
            session,
            dispatcher,
        }
    }

    /// Handle one monitor event.
    ///
    /// Returns the tap outcome for `Inserted` and `None` for other events.
    pub async fn handle_event(&self, event: &CardEvent) -> Option<TapOutcome> {
        match event {
            CardEvent::Inserted { reader, atr } => {
                debug!(reader = %reader, atr = %atr, "Card inserted");
                Some(self.handle_tap(reader, atr).await)
            }
            CardEvent::Removed { reader } => {
                debug!(reader = %reader, "Card removed");
                None
            }
            CardEvent::Fault { reader, error } => {
                match reader {
                    Some(reader) => warn!(reader = %reader, error = %error, "Reader fault"),
                    None => warn!(error = %error, "Reader fault"),
                }
                None
            }
        }
    }

    async fn handle_tap(&self, reader: &ReaderIdentity, inserted_atr: &Atr) -> TapOutcome {
        let session = self.session.clone();
        let target = reader.clone();
        let read = tokio::task::spawn_blocking(move || session.read_uid(&target)).await;

        let uid = match read {
            Ok(Ok(uid)) => uid,
            Ok(Err(ReadError::UidNotFound { atr, status_word })) => {
                // The connection may not report an ATR; the insertion did
                let atr = if atr.is_empty() {
                    inserted_atr.clone()
                } else {
                    atr
                };
                warn!(reader = %reader, atr = %atr, status_word, "UID not found");
                return TapOutcome::UidNotFound {
                    reader: reader.clone(),
                    atr,
                };
            }
            Ok(Err(error)) => {
                warn!(reader = %reader, error = %error, "Card read failed");
                return TapOutcome::ReadFailed {
                    reader: reader.clone(),
                    error,
                };
            }
            Err(e) => {
                warn!(reader = %reader, error = %e, "Card read task failed");
                return TapOutcome::Interrupted {
                    reader: reader.clone(),
                };
            }
        };

        info!(reader = %reader, uid = %uid, "Card UID read");
        match self.dispatcher.send(&uid).await {
            Ok(receipt) => TapOutcome::Sent(receipt),
            Err(error) => TapOutcome::SendFailed { uid, error },
        }
    }

    /// Start the worker task.
    ///
    /// Subscribe the returned [`EventSink`] to the monitor. `report` is
    /// called for every event in order, with the tap outcome for insertions.
    /// The worker ends once every sink clone is dropped and the queue drained.
    pub fn spawn<R>(self, capacity: usize, report: R) -> (EventSink, JoinHandle<()>)
    where
        R: Fn(&CardEvent, Option<&TapOutcome>) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let outcome = self.handle_event(&event).await;
                report(&event, outcome.as_ref());
            }
            debug!("Orchestrator worker stopped");
        });

        (EventSink { tx }, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use badgetap_hardware::mock::{ChannelOp, MockChannel, MockChannelHandle};
    use badgetap_hardware::HardwareError;
    use badgetap_network::RetryPolicy;
    use badgetap_network::mock::MockQueueConnector;
    use std::sync::Arc;

    fn setup() -> (
        Orchestrator<MockChannel, MockQueueConnector>,
        MockChannelHandle,
        MockQueueConnector,
        ReaderIdentity,
    ) {
        let (channel, handle) = MockChannel::new();
        let reader = handle.add_reader("ACR122U").unwrap();
        let queue = MockQueueConnector::new();
        let orchestrator = Orchestrator::new(
            CardSession::new(Arc::new(channel)),
            Dispatcher::new(queue.clone(), RetryPolicy::default()),
        );
        (orchestrator, handle, queue, reader)
    }

    #[tokio::test]
    async fn test_removed_and_fault_are_not_taps() {
        let (orchestrator, handle, queue, reader) = setup();

        let removed = CardEvent::Removed {
            reader: reader.clone(),
        };
        let fault = CardEvent::Fault {
            reader: Some(reader),
            error: HardwareError::reader_unavailable("ACR122U"),
        };
        assert!(orchestrator.handle_event(&removed).await.is_none());
        assert!(orchestrator.handle_event(&fault).await.is_none());
        assert!(handle.calls().is_empty());
        assert_eq!(queue.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_card_gone_before_read() {
        let (orchestrator, handle, queue, reader) = setup();

        let event = CardEvent::Inserted {
            reader: reader.clone(),
            atr: Atr::default(),
        };
        let outcome = orchestrator.handle_event(&event).await.unwrap();
        assert!(matches!(
            outcome,
            TapOutcome::ReadFailed {
                error: ReadError::ConnectFailed { .. },
                ..
            }
        ));
        assert_eq!(handle.open_contexts(), 0);
        assert_eq!(queue.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_uid_not_found_falls_back_to_inserted_atr() {
        let (orchestrator, handle, queue, reader) = setup();
        let atr = Atr::new(vec![0x3B, 0x8F, 0x80, 0x01]);
        handle.insert_card_with_response(&reader, atr.clone(), vec![0x90, 0x00]);
        handle.fail(
            ChannelOp::CardStatus,
            HardwareError::communication("status unavailable"),
        );

        let event = CardEvent::Inserted {
            reader: reader.clone(),
            atr: atr.clone(),
        };
        match orchestrator.handle_event(&event).await.unwrap() {
            TapOutcome::UidNotFound {
                reader: from,
                atr: reported,
            } => {
                assert_eq!(from, reader);
                assert_eq!(reported, atr);
            }
            other => panic!("expected UidNotFound, got {other:?}"),
        }
        assert_eq!(queue.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_event_sink_forwards() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink { tx };
        let reader = ReaderIdentity::new("ACR122U").unwrap();

        sink.on_event(&CardEvent::Removed {
            reader: reader.clone(),
        });
        // Queue full: dropped without blocking
        sink.on_event(&CardEvent::Removed {
            reader: reader.clone(),
        });

        assert_eq!(rx.recv().await, Some(CardEvent::Removed { reader }));
        assert!(rx.try_recv().is_err());
    }
}
