mod connection;
mod meter_actor;
mod poller;

pub use connection::Connection;
pub use meter_actor::{InterestSlot, MeterActor};
pub use poller::{Control, Outcome};
