use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::drivers::{SerialConfig, SimulatorConfig};

/// How the monitor talks to the meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// One blocking exchange per interval
    Sync,
    /// Event-driven exchanges back to back
    Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    pub serial: SerialConfig,
    #[serde(default = "default_mode")]
    pub mode: PollMode,
    /// Pause between blocking exchanges
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Stop after this many readings; run until interrupted when unset
    #[serde(default)]
    pub max_readings: Option<u64>,
    #[serde(default = "default_output")]
    pub output: OutputFormat,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_mode() -> PollMode {
    PollMode::Async
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_output() -> OutputFormat {
    OutputFormat::Text
}

impl MonitorConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default settings
            .set_default("serial.port", "/dev/ttyUSB0")?
            // Shared local settings, e.g. config/default.toml
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            // Per run mode overrides, e.g. config/production.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PF9802__SERIAL__PORT=/dev/ttyS0)
            .add_source(Environment::with_prefix("PF9802").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
