//! Application layer - Meter connections and the tokio host for their exchange cycle

pub mod meter;

pub use meter::{Connection, Control, InterestSlot, MeterActor, Outcome};
