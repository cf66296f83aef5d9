//! Wire protocol of the PF9802 power meter.
//!
//! One request byte, one response marker, then a fixed 20-byte payload of five
//! big-endian floats. No checksum, no length prefix, no framing beyond the
//! fixed sizes.

mod state;

pub use state::ProtocolState;

/// Sent by the client to request one measurement
pub const REQUEST_MARKER: u8 = 0x05;

/// First byte of every meter reply
pub const RESPONSE_MARKER: u8 = 0xFA;

/// Five 32-bit words
pub const PAYLOAD_LEN: usize = 20;

/// Line speed the meter is fixed to
pub const DEFAULT_BAUD_RATE: u32 = 2400;
