//! Queue connection configuration.

use crate::error::QueueError;
use badgetap_core::constants::DEFAULT_QUEUE_TIMEOUT_MS;
use std::time::Duration;

/// Configuration for the TCP queue connector
///
/// # Example
///
/// ```
/// use badgetap_network::QueueConfig;
/// use std::time::Duration;
///
/// let config = QueueConfig::new("queue.local:5672").timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue address as `host:port`
    pub endpoint: String,

    /// Timeout for each I/O operation (connect, send, acknowledgement)
    pub timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:5672".to_string(),
            timeout: Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS),
        }
    }
}

impl QueueConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the I/O timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Config`] if the endpoint is not `host:port`
    /// with a non-zero port, or the timeout is zero.
    pub fn validate(&self) -> Result<(), QueueError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(QueueError::Config("queue endpoint is empty".to_string()));
        }

        let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| {
            QueueError::Config(format!("queue endpoint {endpoint:?} is missing a port"))
        })?;
        if host.is_empty() {
            return Err(QueueError::Config(format!(
                "queue endpoint {endpoint:?} is missing a host"
            )));
        }
        match port.parse::<u16>() {
            Ok(port) if port != 0 => {}
            _ => {
                return Err(QueueError::Config(format!(
                    "queue endpoint {endpoint:?} has an invalid port"
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(QueueError::Config("queue timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.timeout.as_millis(), 3000);
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("127.0.0.1:5672")]
    #[case("queue.example.com:443")]
    #[case("[::1]:5672")]
    fn test_valid_endpoints(#[case] endpoint: &str) {
        assert!(QueueConfig::new(endpoint).validate().is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("localhost")]
    #[case(":5672")]
    #[case("localhost:0")]
    #[case("localhost:http")]
    #[case("localhost:70000")]
    fn test_invalid_endpoints(#[case] endpoint: &str) {
        assert!(matches!(
            QueueConfig::new(endpoint).validate(),
            Err(QueueError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = QueueConfig::default().timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(QueueError::Config(_))));
    }
}
