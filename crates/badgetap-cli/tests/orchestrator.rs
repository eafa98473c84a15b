//! End-to-end tap handling with mock readers and a mock queue.

use badgetap_cli::simulate::{SIMULATED_ATR, SIMULATED_UID};
use badgetap_cli::{Orchestrator, TapOutcome};
use badgetap_core::{Atr, ReaderIdentity};
use badgetap_hardware::mock::{ChannelCall, ChannelOp, MockChannel, MockChannelHandle};
use badgetap_hardware::{CardEvent, CardSession, MonitorConfig, ReaderMonitor};
use badgetap_network::mock::MockQueueConnector;
use badgetap_network::{Dispatcher, QueueError, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Rig {
    channel: Arc<MockChannel>,
    handle: MockChannelHandle,
    queue: MockQueueConnector,
    reader: ReaderIdentity,
}

impl Rig {
    fn new() -> Self {
        let (channel, handle) = MockChannel::new();
        let reader = handle.add_reader("ACS ACR122U PICC Interface 00").unwrap();
        Self {
            channel: Arc::new(channel),
            handle,
            queue: MockQueueConnector::new(),
            reader,
        }
    }

    fn orchestrator(&self) -> Orchestrator<MockChannel, MockQueueConnector> {
        Orchestrator::new(
            CardSession::new(Arc::clone(&self.channel)),
            Dispatcher::new(self.queue.clone(), RetryPolicy::default()),
        )
    }

    fn inserted(&self) -> CardEvent {
        CardEvent::Inserted {
            reader: self.reader.clone(),
            atr: Atr::from(&SIMULATED_ATR[..]),
        }
    }
}

#[tokio::test]
async fn test_tap_sends_uid() {
    let rig = Rig::new();
    rig.handle
        .insert_card(&rig.reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);

    let outcome = rig
        .orchestrator()
        .handle_event(&rig.inserted())
        .await
        .unwrap();

    let TapOutcome::Sent(receipt) = outcome else {
        panic!("expected Sent, got {outcome:?}");
    };
    assert_eq!(receipt.uid.as_str(), "04A1B2C3");
    assert_eq!(receipt.attempts, 1);

    let sent = rig.queue.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_id, receipt.message_id);
    assert_eq!(sent[0].label, "ClockInAndOut");
    assert_eq!(
        serde_json::to_value(sent[0].body()).unwrap(),
        serde_json::json!({ "loginId": "04A1B2C3" })
    );

    assert_eq!(rig.handle.open_contexts(), 0);
    assert_eq!(rig.handle.open_connections(), 0);
    assert_eq!(rig.handle.open_transactions(), 0);
}

#[tokio::test]
async fn test_card_without_uid_is_not_dispatched() {
    let rig = Rig::new();
    rig.handle
        .insert_card_with_response(&rig.reader, SIMULATED_ATR.to_vec(), vec![0x90, 0x00]);

    let outcome = rig
        .orchestrator()
        .handle_event(&rig.inserted())
        .await
        .unwrap();

    match outcome {
        TapOutcome::UidNotFound { reader, atr } => {
            assert_eq!(reader, rig.reader);
            assert_eq!(
                atr.to_string(),
                "3B-8F-80-01-80-4F-0C-A0-00-00-03-06-03-00-01-00-00-00-00-6A"
            );
        }
        other => panic!("expected UidNotFound, got {other:?}"),
    }
    assert_eq!(rig.queue.connect_count(), 0);
    assert!(rig.queue.attempted_messages().is_empty());
    assert_eq!(rig.handle.open_contexts(), 0);
}

#[tokio::test]
async fn test_queue_unreachable_reports_send_failure() {
    let rig = Rig::new();
    rig.handle
        .insert_card(&rig.reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);
    rig.queue.fail_connects(1);

    let outcome = rig
        .orchestrator()
        .handle_event(&rig.inserted())
        .await
        .unwrap();

    match outcome {
        TapOutcome::SendFailed { uid, error } => {
            assert_eq!(uid.as_str(), "04A1B2C3");
            assert!(matches!(
                error.last_error(),
                QueueError::Connect { .. } | QueueError::ConnectTimeout(_)
            ));
            assert!(error.to_string().contains("after 1 attempt(s)"));
        }
        other => panic!("expected SendFailed, got {other:?}"),
    }
    assert_eq!(rig.queue.connect_count(), 1);
    assert!(rig.queue.sent_messages().is_empty());
}

#[tokio::test]
async fn test_transmit_failure_still_releases_reader() {
    let rig = Rig::new();
    rig.handle
        .insert_card(&rig.reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);
    rig.handle.fail(
        ChannelOp::Transmit,
        badgetap_hardware::HardwareError::transmit("card muted"),
    );

    let outcome = rig
        .orchestrator()
        .handle_event(&rig.inserted())
        .await
        .unwrap();

    assert!(matches!(outcome, TapOutcome::ReadFailed { .. }));
    assert_eq!(rig.handle.open_transactions(), 0);
    assert_eq!(rig.handle.open_connections(), 0);
    assert_eq!(rig.handle.open_contexts(), 0);
    assert_eq!(rig.queue.connect_count(), 0);
}

#[tokio::test]
async fn test_tap_reads_the_reader_named_in_the_event() {
    let rig = Rig::new();
    let second = rig.handle.add_reader("OMNIKEY 5022 CL 0").unwrap();
    rig.handle
        .insert_card(&rig.reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);
    rig.handle
        .insert_card(&second, SIMULATED_ATR.to_vec(), &[0x11, 0x22, 0x33, 0x44]);

    let outcome = rig
        .orchestrator()
        .handle_event(&CardEvent::Inserted {
            reader: second.clone(),
            atr: Atr::from(&SIMULATED_ATR[..]),
        })
        .await
        .unwrap();

    let TapOutcome::Sent(receipt) = outcome else {
        panic!("expected Sent, got {outcome:?}");
    };
    assert_eq!(receipt.uid.as_str(), "11223344");
    assert!(
        rig.handle
            .calls()
            .contains(&ChannelCall::Connect { reader: second })
    );
    assert!(!rig.handle.calls().contains(&ChannelCall::Connect {
        reader: rig.reader.clone()
    }));

    let sent = rig.queue.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload.as_str(), "11223344");
}

#[tokio::test]
async fn test_monitor_driven_taps() {
    let rig = Rig::new();
    let (outcomes_tx, mut outcomes) = mpsc::unbounded_channel();
    let (sink, worker) = rig.orchestrator().spawn(8, move |event, outcome| {
        if let Some(outcome) = outcome {
            let _ = outcomes_tx.send((event.clone(), outcome.is_sent()));
        }
    });

    let monitor = ReaderMonitor::new(
        Arc::clone(&rig.channel),
        MonitorConfig::default().with_poll_interval(Duration::from_millis(5)),
    );
    let subscription = monitor.subscribe(sink);
    monitor.start(&[rig.reader.clone()]).unwrap();

    // Let the monitor take its baseline of the empty reader
    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..2 {
        rig.handle
            .insert_card(&rig.reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);
        let (event, sent) = tokio::time::timeout(Duration::from_secs(5), outcomes.recv())
            .await
            .expect("tap not handled in time")
            .unwrap();
        assert!(matches!(event, CardEvent::Inserted { .. }));
        assert!(sent);

        rig.handle.remove_card(&rig.reader);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    monitor.shutdown().await;
    assert!(monitor.unsubscribe(subscription));
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop")
        .unwrap();

    let sent = rig.queue.sent_messages();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|message| message.payload.as_str() == "04A1B2C3"));
    assert_ne!(sent[0].message_id, sent[1].message_id);
}
