//! badgetap service wiring.
//!
//! The binary in `main.rs` parses [`config::Args`], then connects a
//! [`ReaderMonitor`](badgetap_hardware::ReaderMonitor) to an
//! [`Orchestrator`](orchestrator::Orchestrator) that reads each tapped card
//! and sends its UID to the queue. The pieces live in this library so they
//! can be tested end to end with mock readers and queues.

pub mod config;
pub mod console;
pub mod input;
pub mod orchestrator;
pub mod simulate;

pub use config::{AppConfig, Args};
pub use orchestrator::{EVENT_QUEUE_CAPACITY, EventSink, Orchestrator, TapOutcome};
