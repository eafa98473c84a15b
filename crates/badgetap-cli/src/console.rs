//! Operator-facing console lines.
//!
//! Everything the operator reads goes to stdout through this module; logs go
//! to stderr. The `*_line` functions build the text so it can be tested
//! without a terminal.

use crate::orchestrator::TapOutcome;
use badgetap_core::{Atr, ReaderIdentity};
use badgetap_hardware::CardEvent;
use colored::{ColoredString, Colorize};

pub const NO_READERS: &str = "There are currently no readers installed.";

pub fn banner_lines(readers: &[ReaderIdentity]) -> Vec<String> {
    let mut lines = vec![format!(
        "Monitoring {} reader{}:",
        readers.len(),
        if readers.len() == 1 { "" } else { "s" }
    )];
    lines.extend(readers.iter().map(|reader| format!("  {reader}")));
    lines.push("Press Enter to pause or resume, q + Enter or Ctrl-C to quit.".to_string());
    lines
}

pub fn inserted_line(reader: &ReaderIdentity, atr: &Atr) -> String {
    format!("Card inserted in {reader}, ATR {atr}")
}

pub fn removed_line(reader: &ReaderIdentity) -> String {
    format!("Card removed from {reader}")
}

pub fn outcome_line(outcome: &TapOutcome) -> ColoredString {
    match outcome {
        TapOutcome::Sent(receipt) => format!(
            "UID {} successfully sent at {}",
            receipt.uid,
            receipt.sent_at.format("%Y-%m-%d %H:%M:%S")
        )
        .yellow(),
        TapOutcome::UidNotFound { atr, .. } => {
            format!("Error: UID for ATR {atr} is not found").red()
        }
        TapOutcome::ReadFailed { error, .. } => format!("Error: {error}").red(),
        TapOutcome::SendFailed { error, .. } => format!("Error: {error}").red(),
        TapOutcome::Interrupted { reader } => {
            format!("Error: card read on {reader} was interrupted").red()
        }
    }
}

pub fn fault_line(reader: Option<&ReaderIdentity>, error: &dyn std::fmt::Display) -> ColoredString {
    match reader {
        Some(reader) => format!("Reader fault on {reader}: {error}").red(),
        None => format!("Reader fault: {error}").red(),
    }
}

pub fn print_no_readers() {
    println!("{NO_READERS}");
}

pub fn print_banner(readers: &[ReaderIdentity]) {
    for line in banner_lines(readers) {
        println!("{line}");
    }
}

pub fn print_monitoring(active: bool) {
    if active {
        println!("Monitoring resumed.");
    } else {
        println!("Monitoring paused. Press Enter to resume.");
    }
}

pub fn print_error(message: &str) {
    println!("{}", format!("Error: {message}").red());
}

/// Print the lines for one handled event and, for a tap, its outcome.
pub fn report(event: &CardEvent, outcome: Option<&TapOutcome>) {
    match event {
        CardEvent::Inserted { reader, atr } => println!("{}", inserted_line(reader, atr)),
        CardEvent::Removed { reader } => println!("{}", removed_line(reader)),
        CardEvent::Fault { reader, error } => println!("{}", fault_line(reader.as_ref(), error)),
    }
    if let Some(outcome) = outcome {
        println!("{}", outcome_line(outcome));
    }
}
