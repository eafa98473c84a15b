//! Shared contracts for the badgetap reader service.
//!
//! Holds the value types that flow between the reader monitor, the card
//! session, and the queue dispatcher, plus the fixed protocol constants.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
