//! Domain layer - Pure types of the PF9802 meter driver with no I/O of their own
//!
//! This crate contains:
//! - Value Objects (Measurement, Reading)
//! - The wire protocol constants and payload codec
//! - The event-driven exchange state (ProtocolState)
//! - Errors shared by the blocking and event-driven paths
//! - Transport and reactor interfaces (traits)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Testable in isolation

pub mod driver;
pub mod error;
pub mod measurement;
pub mod protocol;

// Re-export commonly used types
pub use driver::{Interest, Reactor, Transport};
pub use error::{DomainError, ExchangeError, ExchangeErrorKind};
pub use measurement::{Measurement, Reading};
pub use protocol::{PAYLOAD_LEN, ProtocolState, REQUEST_MARKER, RESPONSE_MARKER};
