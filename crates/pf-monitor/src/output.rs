use std::io::{self, Write};

use domain::Reading;
use infrastructure::OutputFormat;

/// Renders a reading as the aligned text block or a single JSON line
pub fn render(reading: &Reading, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(format!(
            "time    : {}\n{}\n",
            reading.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            reading.measurement
        )),
        OutputFormat::Json => serde_json::to_string(reading),
    }
}

/// Writes readings to stdout, flushing after each one
#[derive(Debug, Clone, Copy)]
pub struct ReadingPrinter {
    format: OutputFormat,
}

impl ReadingPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn print(&self, reading: &Reading) -> io::Result<()> {
        let text = render(reading, self.format).map_err(io::Error::other)?;
        let mut out = io::stdout().lock();
        writeln!(out, "{}", text)?;
        out.flush()
    }
}
