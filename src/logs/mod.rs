//! Logs module - the Source-engine log-forwarding stream
//!
//! Provides:
//! - Parsing of a single forwarded log datagram into a timestamped event
//! - A UDP listener that turns the datagram stream into ordered events
//! - Helpers for picking apart log message text

mod listener;
mod parser;
pub mod text;

pub use listener::*;
pub use parser::*;
