use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Measurement;

/// A measurement stamped with the time the exchange completed on this host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub measurement: Measurement,
}

impl Reading {
    pub fn new(measurement: Measurement, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            measurement,
        }
    }

    /// Stamps the measurement with the current time
    pub fn now(measurement: Measurement) -> Self {
        Self::new(measurement, Utc::now())
    }
}
