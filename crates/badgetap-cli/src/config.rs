//! Command line and environment configuration.

use badgetap_core::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_TIMEOUT_MS};
use badgetap_core::{Error, ReaderIdentity, Result};
use badgetap_hardware::MonitorConfig;
use badgetap_network::{QueueConfig, RetryPolicy};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "badgetap",
    version,
    about = "Forward the UID of every card tapped on a reader to the message queue"
)]
pub struct Args {
    /// Queue address as host:port
    #[arg(long = "queue", env = "BADGETAP_QUEUE_ENDPOINT")]
    pub queue_endpoint: Option<String>,

    /// Timeout for each queue operation, in milliseconds
    #[arg(long, env = "BADGETAP_QUEUE_TIMEOUT_MS", default_value_t = DEFAULT_QUEUE_TIMEOUT_MS)]
    pub queue_timeout_ms: u64,

    /// Delay between two reader status polls, in milliseconds
    #[arg(long, env = "BADGETAP_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Attempts per UID before giving up (1 = no retry)
    #[arg(long, env = "BADGETAP_SEND_ATTEMPTS", default_value_t = 1)]
    pub send_attempts: u32,

    /// Only monitor this reader (repeatable; default: all readers)
    #[arg(short, long = "reader")]
    pub readers: Vec<String>,

    /// Use a simulated reader that is tapped periodically
    #[arg(long)]
    pub simulate: bool,

    /// Debug level output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub monitor: MonitorConfig,
    pub retry: RetryPolicy,
    /// Empty means every reader the driver reports.
    pub readers: Vec<ReaderIdentity>,
    pub simulate: bool,
}

impl Args {
    /// Validate the arguments into an [`AppConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`] without a queue endpoint and
    /// [`Error::Config`] for invalid values.
    pub fn into_config(self) -> Result<AppConfig> {
        let endpoint = self
            .queue_endpoint
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| {
                Error::MissingConfig(
                    "queue endpoint (--queue or BADGETAP_QUEUE_ENDPOINT)".to_string(),
                )
            })?;

        let queue = QueueConfig::new(endpoint.trim())
            .timeout(Duration::from_millis(self.queue_timeout_ms));
        queue.validate().map_err(|e| Error::Config(e.to_string()))?;

        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be positive".to_string()));
        }
        if self.send_attempts == 0 {
            return Err(Error::Config("send attempts must be at least 1".to_string()));
        }

        let readers = self
            .readers
            .into_iter()
            .map(ReaderIdentity::new)
            .collect::<Result<Vec<_>>>()?;

        Ok(AppConfig {
            queue,
            monitor: MonitorConfig::default()
                .with_poll_interval(Duration::from_millis(self.poll_interval_ms)),
            retry: RetryPolicy::default().max_attempts(self.send_attempts),
            readers,
            simulate: self.simulate,
        })
    }
}
