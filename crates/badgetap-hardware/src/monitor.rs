//! Reader monitor.
//!
//! This module provides the `ReaderMonitor`, which polls a set of readers
//! on a background task and turns slot state changes into [`CardEvent`]s
//! delivered to every subscriber.
//!
//! # Reader state machine
//!
//! ```text
//!            first poll (silent)
//!  Unknown ─────────────────────► Absent ◄──────┐
//!     │                             │ Inserted  │ Removed
//!     │      first poll (silent)    ▼           │
//!     └───────────────────────────► Present ────┘
//!
//!  any state ── Unavailable ──► Faulted ── next poll (silent) ──► Absent/Present
//! ```
//!
//! The first observation after `start` or `resume` only establishes the
//! baseline: a card already lying on the reader is not reported.
//!
//! # Delivery
//!
//! Handlers run synchronously on the monitor task, under the monitor's
//! control lock. They must return quickly and must not call back into the
//! monitor's control methods (`pause`, `resume`, `toggle`).
//!
//! # Examples
//!
//! ```no_run
//! use badgetap_hardware::mock::MockChannel;
//! use badgetap_hardware::monitor::{CardEvent, MonitorConfig, ReaderMonitor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (channel, handle) = MockChannel::new();
//!     let reader = handle.add_reader("ACR122U").unwrap();
//!
//!     let monitor = ReaderMonitor::new(Arc::new(channel), MonitorConfig::default());
//!     monitor.subscribe(|event: &CardEvent| println!("{event:?}"));
//!     monitor.start(&[reader]).unwrap();
//!
//!     // ...
//!
//!     monitor.shutdown().await;
//! }
//! ```

use crate::error::HardwareError;
use crate::traits::HardwareChannel;
use crate::types::{SlotState, SlotStatus};
use badgetap_core::constants::DEFAULT_POLL_INTERVAL_MS;
use badgetap_core::{Atr, ReaderIdentity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Card event observed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// A card was placed on the reader.
    Inserted { reader: ReaderIdentity, atr: Atr },

    /// The card was taken off the reader.
    Removed { reader: ReaderIdentity },

    /// Observation failed.
    ///
    /// `reader` is `Some` when a single reader became unusable and `None`
    /// when the whole status query failed.
    Fault {
        reader: Option<ReaderIdentity>,
        error: HardwareError,
    },
}

impl CardEvent {
    /// Reader this event concerns, if any.
    pub fn reader(&self) -> Option<&ReaderIdentity> {
        match self {
            Self::Inserted { reader, .. } | Self::Removed { reader } => Some(reader),
            Self::Fault { reader, .. } => reader.as_ref(),
        }
    }
}

/// Receiver of card events.
///
/// Implemented for any `Fn(&CardEvent)` closure.
pub trait CardEventHandler: Send + Sync + 'static {
    fn on_event(&self, event: &CardEvent);
}

impl<F> CardEventHandler for F
where
    F: Fn(&CardEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &CardEvent) {
        self(event)
    }
}

/// Token returned by [`ReaderMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Errors from the monitor control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    /// Monitoring was requested for an empty reader set.
    #[error("There are currently no readers installed.")]
    NoReaders,

    /// Monitoring is already active.
    #[error("Reader monitor is already running")]
    AlreadyRunning,
}

/// Configuration for the reader monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between two status polls.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl MonitorConfig {
    /// Set the polling interval. Zero is raised to one millisecond.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

#[derive(Debug, Default)]
struct Control {
    generation: u64,
    running: bool,
    readers: Vec<ReaderIdentity>,
    task: Option<JoinHandle<()>>,
}

type Subscribers = Vec<(SubscriptionId, Arc<dyn CardEventHandler>)>;

#[derive(Default)]
struct Shared {
    subscribers: RwLock<Subscribers>,
    control: Mutex<Control>,
    next_id: AtomicU64,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.control().generation == generation
    }

    /// Deliver events unless the monitor was paused since `generation`
    /// started. Returns `false` if the poll loop should stop.
    fn deliver(&self, generation: u64, events: &[CardEvent]) -> bool {
        let control = self.control();
        if control.generation != generation {
            return false;
        }
        if events.is_empty() {
            return true;
        }

        let handlers: Vec<_> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for event in events {
            for handler in &handlers {
                handler.on_event(event);
            }
        }
        drop(control);
        true
    }
}

/// Watches readers for card insertion and removal.
///
/// Cloning is cheap; clones control the same monitor.
pub struct ReaderMonitor<C> {
    channel: Arc<C>,
    config: MonitorConfig,
    shared: Arc<Shared>,
}

impl<C> Clone for ReaderMonitor<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> std::fmt::Debug for ReaderMonitor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.shared.control();
        f.debug_struct("ReaderMonitor")
            .field("config", &self.config)
            .field("running", &control.running)
            .field("readers", &control.readers)
            .finish()
    }
}

impl<C: HardwareChannel + 'static> ReaderMonitor<C> {
    pub fn new(channel: Arc<C>, config: MonitorConfig) -> Self {
        Self {
            channel,
            config,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Register a handler for every subsequent event.
    pub fn subscribe(&self, handler: impl CardEventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Begin monitoring `readers` on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NoReaders`] if `readers` is empty and
    /// [`MonitorError::AlreadyRunning`] if monitoring is active.
    pub fn start(&self, readers: &[ReaderIdentity]) -> Result<(), MonitorError> {
        let mut control = self.shared.control();
        self.begin(&mut control, readers)?;
        info!(readers = control.readers.len(), "Reader monitoring started");
        Ok(())
    }

    /// Stop delivering events until [`resume`](Self::resume).
    ///
    /// Once this returns no further event reaches any subscriber.
    /// Subscriptions are kept. Returns `false` if monitoring was not active.
    pub fn pause(&self) -> bool {
        let mut control = self.shared.control();
        let paused = Self::halt(&mut control);
        if paused {
            info!("Reader monitoring paused");
        }
        paused
    }

    /// Resume monitoring after [`pause`](Self::pause).
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn resume(&self, readers: &[ReaderIdentity]) -> Result<(), MonitorError> {
        let mut control = self.shared.control();
        self.begin(&mut control, readers)?;
        info!(readers = control.readers.len(), "Reader monitoring resumed");
        Ok(())
    }

    /// Pause if monitoring, resume otherwise.
    ///
    /// Returns whether monitoring is active afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NoReaders`] if resuming with an empty set.
    pub fn toggle(&self, readers: &[ReaderIdentity]) -> Result<bool, MonitorError> {
        let mut control = self.shared.control();
        if control.running {
            Self::halt(&mut control);
            info!("Reader monitoring paused");
            Ok(false)
        } else {
            self.begin(&mut control, readers)?;
            info!(readers = control.readers.len(), "Reader monitoring resumed");
            Ok(true)
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.shared.control().running
    }

    /// Readers of the current or most recent monitoring run.
    pub fn readers(&self) -> Vec<ReaderIdentity> {
        self.shared.control().readers.clone()
    }

    /// Stop monitoring and wait for the poll task to release its context.
    pub async fn shutdown(&self) {
        let task = {
            let mut control = self.shared.control();
            Self::halt(&mut control);
            control.task.take()
        };

        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Reader monitor task ended abnormally");
        }
    }

    fn begin(&self, control: &mut Control, readers: &[ReaderIdentity]) -> Result<(), MonitorError> {
        if control.running {
            return Err(MonitorError::AlreadyRunning);
        }
        if readers.is_empty() {
            return Err(MonitorError::NoReaders);
        }

        let mut unique = Vec::with_capacity(readers.len());
        for reader in readers {
            if !unique.contains(reader) {
                unique.push(reader.clone());
            }
        }

        control.generation += 1;
        control.running = true;
        control.readers = unique.clone();

        // A task from a previous run exits on its own at its next tick.
        control.task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.channel),
            self.config.poll_interval,
            Arc::clone(&self.shared),
            control.generation,
            unique,
        )));
        Ok(())
    }

    fn halt(control: &mut Control) -> bool {
        if !control.running {
            return false;
        }
        control.running = false;
        control.generation += 1;
        true
    }
}

/// Driver calls block, so each poll runs on the blocking pool and the
/// poller travels there and back.
async fn poll_loop<C: HardwareChannel + 'static>(
    channel: Arc<C>,
    interval: Duration,
    shared: Arc<Shared>,
    generation: u64,
    readers: Vec<ReaderIdentity>,
) {
    let mut poller = Poller::new(channel, readers);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.is_current(generation) {
            break;
        }

        let polled = tokio::task::spawn_blocking(move || {
            let events = poller.poll_once();
            (poller, events)
        })
        .await;
        let events = match polled {
            Ok((returned, events)) => {
                poller = returned;
                events
            }
            Err(e) => {
                warn!(error = %e, generation, "Reader poll task failed");
                return;
            }
        };

        if !shared.deliver(generation, &events) {
            break;
        }
    }

    if let Err(e) = tokio::task::spawn_blocking(move || poller.close()).await {
        warn!(error = %e, "Failed to close reader poller");
    }
    debug!(generation, "Reader poll loop stopped");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderPhase {
    Unknown,
    Absent,
    Present,
    Faulted,
}

#[derive(Debug)]
struct ReaderTracker {
    reader: ReaderIdentity,
    phase: ReaderPhase,
}

impl ReaderTracker {
    fn new(reader: ReaderIdentity) -> Self {
        Self {
            reader,
            phase: ReaderPhase::Unknown,
        }
    }

    fn observe(&mut self, state: &SlotState) -> Option<CardEvent> {
        use ReaderPhase::*;

        let (next, event) = match (self.phase, state) {
            (Faulted, SlotState::Unavailable { .. }) => (Faulted, None),
            (_, SlotState::Unavailable { reason }) => {
                warn!(reader = %self.reader, reason = %reason, "Reader unavailable");
                let event = CardEvent::Fault {
                    reader: Some(self.reader.clone()),
                    error: HardwareError::reader_unavailable(self.reader.as_str()),
                };
                (Faulted, Some(event))
            }
            (Unknown | Faulted, SlotState::Absent) => (Absent, None),
            (Unknown | Faulted, SlotState::Present { .. }) => (Present, None),
            (Absent, SlotState::Present { atr }) => {
                let event = CardEvent::Inserted {
                    reader: self.reader.clone(),
                    atr: atr.clone(),
                };
                (Present, Some(event))
            }
            (Present, SlotState::Absent) => {
                let event = CardEvent::Removed {
                    reader: self.reader.clone(),
                };
                (Absent, Some(event))
            }
            (phase, _) => (phase, None),
        };

        if next != self.phase {
            debug!(reader = %self.reader, from = ?self.phase, to = ?next, "Reader phase changed");
        }
        self.phase = next;
        event
    }
}

/// Poll-loop state: the long-lived driver context and per-reader phases.
struct Poller<C: HardwareChannel> {
    channel: Arc<C>,
    context: Option<C::Context>,
    readers: Vec<ReaderIdentity>,
    trackers: Vec<ReaderTracker>,
    faulted: bool,
}

impl<C: HardwareChannel> Poller<C> {
    fn new(channel: Arc<C>, readers: Vec<ReaderIdentity>) -> Self {
        let trackers = readers.iter().cloned().map(ReaderTracker::new).collect();
        Self {
            channel,
            context: None,
            readers,
            trackers,
            faulted: false,
        }
    }

    fn poll_once(&mut self) -> Vec<CardEvent> {
        if self.context.is_none() {
            match self.channel.establish_context() {
                Ok(context) => self.context = Some(context),
                Err(e) => return self.fail(e),
            }
        }
        let Some(context) = self.context.as_ref() else {
            return Vec::new();
        };

        match self.channel.poll_status(context, &self.readers) {
            Ok(statuses) => {
                self.faulted = false;
                statuses
                    .iter()
                    .filter_map(|status| self.observe(status))
                    .collect()
            }
            Err(e) => {
                self.release();
                self.fail(e)
            }
        }
    }

    fn observe(&mut self, status: &SlotStatus) -> Option<CardEvent> {
        self.trackers
            .iter_mut()
            .find(|tracker| tracker.reader == status.reader)
            .and_then(|tracker| tracker.observe(&status.state))
    }

    /// Reset every reader to `Unknown` and report the failure once.
    fn fail(&mut self, error: HardwareError) -> Vec<CardEvent> {
        for tracker in &mut self.trackers {
            tracker.phase = ReaderPhase::Unknown;
        }
        if self.faulted {
            return Vec::new();
        }
        self.faulted = true;
        warn!(error = %error, "Reader status query failed");
        vec![CardEvent::Fault {
            reader: None,
            error,
        }]
    }

    fn release(&mut self) {
        if let Some(context) = self.context.take()
            && let Err(e) = self.channel.release_context(context)
        {
            debug!(error = %e, "Failed to release monitor context");
        }
    }

    fn close(mut self) {
        self.release();
    }
}
