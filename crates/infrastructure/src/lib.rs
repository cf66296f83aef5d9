//! Infrastructure layer - Serial lines, byte-level I/O and simulated meters

pub mod config;
pub mod drivers;

pub use config::{MonitorConfig, OutputFormat, PollMode};
pub use drivers::{SerialConfig, SerialLine};
