//! Protocol module - the Source-engine RCON and log-forwarding wire formats
//!
//! RCON frames are length-prefixed binary packets:
//! - 4 bytes size, little-endian, excluding the size field itself
//! - 4 bytes request id, little-endian
//! - 4 bytes packet type, little-endian
//! - body bytes, NUL terminated
//! - one additional NUL closing the packet
//!
//! Forwarded log lines arrive as UDP datagrams prefixed with four 0xFF
//! marker bytes and a one-byte packet-type indicator.

mod packet;
mod codec;

pub use packet::*;
pub use codec::*;

/// Default RCON port for Source-engine servers
pub const DEFAULT_RCON_PORT: u16 = 27015;

/// Default local port for receiving forwarded log datagrams
pub const DEFAULT_LOG_PORT: u16 = 1776;

/// Marker bytes prefixing every forwarded log datagram
pub const LOG_MARKER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Largest declared packet size the protocol allows
pub const MAX_PACKET_SIZE: i32 = 4096;

/// Request id (4) + type (4) + two NUL terminators, i.e. everything the
/// declared size covers besides the body
pub const PACKET_OVERHEAD: usize = 10;

/// Largest body an encoded packet may carry
pub const MAX_BODY_SIZE: usize = MAX_PACKET_SIZE as usize - PACKET_OVERHEAD;
