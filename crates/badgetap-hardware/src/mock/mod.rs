//! Mock reader driver for testing and development.
//!
//! This module provides a simulated driver that can be controlled
//! programmatically without a PC/SC service or physical reader.

pub mod channel;

pub use channel::{ChannelCall, ChannelOp, MockChannel, MockChannelHandle};
