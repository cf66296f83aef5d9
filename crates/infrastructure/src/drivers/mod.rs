mod device_simulator;
pub mod partial_io;
mod scripted_line;
mod serial;

pub use device_simulator::{InstrumentSimulator, SimulatorConfig};
pub use partial_io::{ReadProgress, ReadStop, read_bounded, write_bounded};
pub use scripted_line::{ReadStep, ScriptedLine, WriteStep};
pub use serial::{SerialConfig, SerialLine};

#[cfg(target_os = "linux")]
pub use device_simulator::PtyInstrument;
