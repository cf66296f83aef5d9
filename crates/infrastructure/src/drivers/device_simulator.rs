use std::time::Instant;

use domain::Measurement;
use domain::protocol::{PAYLOAD_LEN, REQUEST_MARKER, RESPONSE_MARKER};
use serde::{Deserialize, Serialize};

/// Nominal values of the simulated mains supply and load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_voltage")]
    pub voltage: f32,
    #[serde(default = "default_current")]
    pub current: f32,
    #[serde(default = "default_power_factor")]
    pub power_factor: f32,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    /// Relative amplitude of the slow sine swing applied to voltage and current
    #[serde(default = "default_swing")]
    pub swing: f32,
    #[serde(default = "default_period_secs")]
    pub period_secs: f64,
}

fn default_voltage() -> f32 {
    230.0
}
fn default_current() -> f32 {
    1.5
}
fn default_power_factor() -> f32 {
    0.95
}
fn default_frequency() -> f32 {
    50.0
}
fn default_swing() -> f32 {
    0.02
}
fn default_period_secs() -> f64 {
    10.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            voltage: default_voltage(),
            current: default_current(),
            power_factor: default_power_factor(),
            frequency: default_frequency(),
            swing: default_swing(),
            period_secs: default_period_secs(),
        }
    }
}

/// Protocol side of a simulated PF9802: answers request markers with readings
#[derive(Debug, Clone)]
pub struct InstrumentSimulator {
    config: SimulatorConfig,
    start_time: Instant,
}

impl InstrumentSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Reading after `elapsed_secs` of simulated time
    pub fn measurement_at(&self, elapsed_secs: f64) -> Measurement {
        let period = if self.config.period_secs > 0.0 {
            self.config.period_secs
        } else {
            default_period_secs()
        };
        let phase = (elapsed_secs / period * 2.0 * std::f64::consts::PI).sin() as f32;
        let factor = 1.0 + self.config.swing * phase;

        let voltage = self.config.voltage * factor;
        let current = self.config.current * factor;
        let frequency = self.config.frequency + 0.05 * phase;
        let power = voltage * current * self.config.power_factor;

        Measurement::new(voltage, current, self.config.power_factor, frequency, power)
    }

    pub fn current_measurement(&self) -> Measurement {
        self.measurement_at(self.start_time.elapsed().as_secs_f64())
    }

    /// Bytes to send back for one received byte; anything but a request is ignored
    pub fn respond(&self, request: u8) -> Option<[u8; PAYLOAD_LEN + 1]> {
        if request != REQUEST_MARKER {
            tracing::debug!(byte = request, "Simulator ignoring unknown request byte");
            return None;
        }

        let mut reply = [0u8; PAYLOAD_LEN + 1];
        reply[0] = RESPONSE_MARKER;
        reply[1..].copy_from_slice(&self.current_measurement().encode());
        Some(reply)
    }
}

#[cfg(target_os = "linux")]
pub use pty::PtyInstrument;

#[cfg(target_os = "linux")]
mod pty {
    use std::fs::{File, OpenOptions};
    use std::io::{self, ErrorKind, Read, Write};
    use std::os::unix::fs::OpenOptionsExt;
    use std::thread;

    use nix::errno::Errno;
    use nix::fcntl::OFlag;
    use nix::pty::{PtyMaster, grantpt, posix_openpt, ptsname_r, unlockpt};

    use super::{InstrumentSimulator, SimulatorConfig};

    /// Simulated meter behind a pseudo-terminal
    ///
    /// [`PtyInstrument::path`] names a tty that can be opened like the real
    /// serial port.
    pub struct PtyInstrument {
        master: PtyMaster,
        // Keeps the tty alive between clients so the master never reads EIO.
        _slave: File,
        path: String,
        simulator: InstrumentSimulator,
    }

    impl PtyInstrument {
        pub fn open(config: SimulatorConfig) -> io::Result<Self> {
            let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)?;
            grantpt(&master)?;
            unlockpt(&master)?;
            let path = ptsname_r(&master)?;

            let slave = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(OFlag::O_NOCTTY.bits())
                .open(&path)?;

            let simulator = InstrumentSimulator::new(config);
            tracing::info!(
                path = %path,
                voltage = simulator.config().voltage,
                current = simulator.config().current,
                "Simulated PF9802 listening"
            );

            Ok(Self {
                master,
                _slave: slave,
                path,
                simulator,
            })
        }

        pub fn path(&self) -> &str {
            &self.path
        }

        /// Answers requests until the tty is hung up
        pub fn serve(mut self) -> io::Result<()> {
            let mut request = [0u8; 1];
            loop {
                match self.master.read(&mut request) {
                    Ok(0) => return Ok(()),
                    Ok(_) => {
                        if let Some(reply) = self.simulator.respond(request[0]) {
                            self.master.write_all(&reply)?;
                            tracing::trace!("Simulator sent reading");
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if e.raw_os_error() == Some(Errno::EIO as i32) => {
                        tracing::debug!(path = %self.path, "Simulator tty hung up");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        /// Runs [`PtyInstrument::serve`] on a detached thread
        pub fn spawn(self) -> io::Result<thread::JoinHandle<io::Result<()>>> {
            thread::Builder::new()
                .name("pf9802-simulator".to_string())
                .spawn(move || self.serve())
        }
    }
}
