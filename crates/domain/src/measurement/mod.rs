use std::fmt;

use serde::{Deserialize, Serialize};

mod reading;
pub use reading::Reading;

use crate::protocol::PAYLOAD_LEN;

const FIELD_LEN: usize = 4;

/// One set of values reported by the meter.
///
/// Fields are raw instrument floats in wire order. No range check and no unit
/// conversion is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    /// Volts (RMS)
    pub voltage: f32,
    /// Amperes (RMS)
    pub current: f32,
    pub power_factor: f32,
    /// Hertz
    pub frequency: f32,
    /// Watts
    pub power: f32,
}

impl Measurement {
    pub fn new(voltage: f32, current: f32, power_factor: f32, frequency: f32, power: f32) -> Self {
        Self {
            voltage,
            current,
            power_factor,
            frequency,
            power,
        }
    }

    /// Decodes the 20-byte payload: five big-endian IEEE-754 words.
    ///
    /// Total: every input yields some quintuple, NaN payloads included.
    pub fn decode(payload: &[u8; PAYLOAD_LEN]) -> Self {
        let word = |index: usize| {
            let start = index * FIELD_LEN;
            let mut bytes = [0u8; FIELD_LEN];
            bytes.copy_from_slice(&payload[start..start + FIELD_LEN]);
            f32::from_bits(u32::from_be_bytes(bytes))
        };

        Self {
            voltage: word(0),
            current: word(1),
            power_factor: word(2),
            frequency: word(3),
            power: word(4),
        }
    }

    /// Inverse of [`Measurement::decode`], bit for bit.
    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut payload = [0u8; PAYLOAD_LEN];
        for (chunk, value) in payload.chunks_exact_mut(FIELD_LEN).zip(self.fields()) {
            chunk.copy_from_slice(&value.to_bits().to_be_bytes());
        }
        payload
    }

    /// Values in wire order
    pub fn fields(&self) -> [f32; 5] {
        [
            self.voltage,
            self.current,
            self.power_factor,
            self.frequency,
            self.power,
        ]
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "voltage : {:.8}", self.voltage)?;
        writeln!(f, "current : {:.8}", self.current)?;
        writeln!(f, "pf      : {:.8}", self.power_factor)?;
        writeln!(f, "freq    : {:.8}", self.frequency)?;
        write!(f, "power   : {:.8}", self.power)
    }
}
