//! Error types for reader driver operations.
//!
//! This module defines the errors a [`HardwareChannel`](crate::traits::HardwareChannel)
//! reports: context setup failures, unknown or unplugged readers, missing cards,
//! and failures of the individual connect, transaction, and transmit steps.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during reader driver operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// Driver context could not be established or released.
    #[error("Reader context error: {message}")]
    Context { message: String },

    /// Reader is unknown to the driver or has been unplugged.
    #[error("Reader unavailable: {reader}")]
    ReaderUnavailable { reader: String },

    /// No card is present in the reader.
    #[error("No card present in reader {reader}")]
    NoCard { reader: String },

    /// Connection to the reader failed for another reason.
    #[error("Could not connect to reader {reader}: {message}")]
    Connect { reader: String, message: String },

    /// Exclusive transaction could not be started or ended.
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Command exchange with the card failed.
    #[error("Transmit error: {message}")]
    Transmit { message: String },

    /// Any other driver communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data handed to or received from the driver.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Operation is not supported by this channel.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },
}

impl HardwareError {
    /// Create a new context error.
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
        }
    }

    /// Create a new reader unavailable error.
    pub fn reader_unavailable(reader: impl Into<String>) -> Self {
        Self::ReaderUnavailable {
            reader: reader.into(),
        }
    }

    /// Create a new no card error.
    pub fn no_card(reader: impl Into<String>) -> Self {
        Self::NoCard {
            reader: reader.into(),
        }
    }

    /// Create a new connect error.
    pub fn connect(reader: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            reader: reader.into(),
            message: message.into(),
        }
    }

    /// Create a new transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a new transmit error.
    pub fn transmit(message: impl Into<String>) -> Self {
        Self::Transmit {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_unavailable_error() {
        let error = HardwareError::reader_unavailable("ACR122U");
        assert!(matches!(error, HardwareError::ReaderUnavailable { .. }));
        assert_eq!(error.to_string(), "Reader unavailable: ACR122U");
    }

    #[test]
    fn test_no_card_error() {
        let error = HardwareError::no_card("ACR122U");
        assert_eq!(error.to_string(), "No card present in reader ACR122U");
    }

    #[test]
    fn test_connect_error() {
        let error = HardwareError::connect("ACR122U", "Sharing violation");
        assert!(matches!(error, HardwareError::Connect { .. }));
        assert_eq!(
            error.to_string(),
            "Could not connect to reader ACR122U: Sharing violation"
        );
    }

    #[test]
    fn test_transmit_error() {
        let error = HardwareError::transmit("Card was removed");
        assert_eq!(error.to_string(), "Transmit error: Card was removed");
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            HardwareError::context("no service"),
            HardwareError::transaction("busy"),
            HardwareError::unsupported("poll_status"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
