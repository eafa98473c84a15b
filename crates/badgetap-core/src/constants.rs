//! Fixed values shared across the badgetap crates.
//!
//! The service models exactly one card command (GET UID) and one outbound
//! message shape, so their parameters live here rather than in configuration.
//!
//! # Usage
//!
//! ```
//! use badgetap_core::constants::*;
//!
//! // The GET UID command as sent on the wire
//! let command = [GET_UID_CLA, GET_UID_INS, GET_UID_P1, GET_UID_P2, GET_UID_LE];
//! assert_eq!(command, [0xFF, 0xCA, 0x00, 0x00, 0x00]);
//!
//! assert_eq!(MESSAGE_LABEL, "ClockInAndOut");
//! ```

// ============================================================================
// GET UID command
// ============================================================================

/// Class byte of the reader-specific (pseudo-APDU) command space.
///
/// PC/SC contactless readers interpret `CLA = 0xFF` themselves instead of
/// forwarding the command to the card.
pub const GET_UID_CLA: u8 = 0xFF;

/// GET DATA instruction (ISO 7816-4).
pub const GET_UID_INS: u8 = 0xCA;

/// P1 = 0x00 selects the card UID (P1 = 0x01 would select historical bytes).
pub const GET_UID_P1: u8 = 0x00;

/// P2 is unused by GET UID.
pub const GET_UID_P2: u8 = 0x00;

/// Expected length `0`: the UID size is unknown, return whatever is available.
pub const GET_UID_LE: u8 = 0x00;

/// Size of the receive buffer handed to the driver on transmit.
///
/// A short APDU with `Le = 0` may return up to 256 data bytes followed by the
/// two status bytes.
pub const RESPONSE_BUFFER_LEN: usize = 256 + 2;

/// Status word reported by a successful command.
pub const SW_SUCCESS: u16 = 0x9000;

// ============================================================================
// Outbound message
// ============================================================================

/// Label attached to every outbound message.
pub const MESSAGE_LABEL: &str = "ClockInAndOut";

/// Content type of the outbound message body.
pub const MESSAGE_CONTENT_TYPE: &str = "application/json";

/// Time-to-live of an outbound message in seconds.
///
/// A clock-in/out event is worthless after a couple of minutes, so the queue
/// is allowed to drop it once this elapses.
pub const MESSAGE_TTL_SECS: u64 = 120;

// ============================================================================
// Defaults
// ============================================================================

/// Default delay between two status polls of the reader monitor.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default timeout applied to each queue I/O operation.
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 3000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_buffer_holds_full_short_response() {
        assert!(RESPONSE_BUFFER_LEN >= 256);
        assert_eq!(RESPONSE_BUFFER_LEN - 2, 256);
    }

    #[test]
    fn test_ttl_is_short() {
        assert!(MESSAGE_TTL_SECS <= 300);
    }
}
