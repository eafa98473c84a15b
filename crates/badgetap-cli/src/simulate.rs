//! Simulated reader for running without hardware.
//!
//! A single mock reader gets the same card tapped on it at a fixed
//! interval: the card rests for a moment, then is taken away.

use badgetap_core::ReaderIdentity;
use badgetap_hardware::mock::{MockChannel, MockChannelHandle};
use badgetap_hardware::Result;
use std::time::Duration;
use tracing::info;

pub const SIMULATED_READER: &str = "Simulated PICC Reader 00";

/// ATR of a MIFARE Classic 1K as reported by PC/SC contactless readers.
pub const SIMULATED_ATR: [u8; 20] = [
    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x03, 0x06, 0x03, 0x00, 0x01, 0x00,
    0x00, 0x00, 0x00, 0x6A,
];

pub const SIMULATED_UID: [u8; 4] = [0x04, 0xA1, 0xB2, 0xC3];

/// How long the simulated card stays on the reader.
const DWELL: Duration = Duration::from_millis(800);

/// Create a mock driver with one empty simulated reader.
///
/// # Errors
///
/// Never fails for the built-in reader name; the error type comes from the mock.
pub fn simulated_channel() -> Result<(MockChannel, MockChannelHandle, ReaderIdentity)> {
    let (channel, handle) = MockChannel::new();
    let reader = handle.add_reader(SIMULATED_READER)?;
    Ok((channel, handle, reader))
}

/// Tap the simulated card every `interval`, forever.
pub async fn run_taps(handle: MockChannelHandle, reader: ReaderIdentity, interval: Duration) {
    let mut ticker = tokio::time::interval(interval.max(DWELL * 2));
    ticker.tick().await;

    loop {
        ticker.tick().await;
        info!(reader = %reader, "Simulated card tap");
        handle.insert_card(&reader, SIMULATED_ATR.to_vec(), &SIMULATED_UID);
        tokio::time::sleep(DWELL).await;
        handle.remove_card(&reader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use badgetap_hardware::HardwareChannel;

    #[test]
    fn test_simulated_channel_has_one_reader() {
        let (channel, _handle, reader) = simulated_channel().unwrap();
        assert_eq!(channel.list_readers().unwrap(), vec![reader]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_taps_insert_and_remove() {
        let (channel, handle, reader) = simulated_channel().unwrap();
        let task = tokio::spawn(run_taps(handle.clone(), reader.clone(), Duration::from_secs(5)));

        let context = channel.establish_context().unwrap();
        tokio::time::sleep(Duration::from_millis(5100)).await;
        let status = channel.poll_status(&context, &[reader.clone()]).unwrap();
        assert!(status[0].state.is_present());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = channel.poll_status(&context, &[reader]).unwrap();
        assert!(!status[0].state.is_present());

        task.abort();
    }
}
