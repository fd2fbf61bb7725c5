//! Report output sinks

use obd_protocol::{CarModule, PidDescriptor, Reading, Signal};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{info, warn};

/// How decoded readings are written out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human readable line per reading, through the log
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Destination for report lines
pub trait ReportSink: Send {
    fn emit(&mut self, descriptor: &PidDescriptor, reading: &Reading, line: &str);
}

/// Emits report lines as `info!` events
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, descriptor: &PidDescriptor, _reading: &Reading, line: &str) {
        info!(pid = descriptor.pid, module = %descriptor.module, "{}", line);
    }
}

#[derive(Serialize)]
struct ReportRecord<'a> {
    signal: Signal,
    module: CarModule,
    pid: u16,
    reading: &'a Reading,
    text: &'a str,
}

/// Writes one JSON object per reading to `W`
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, descriptor: &PidDescriptor, reading: &Reading, line: &str) {
        let record = ReportRecord {
            signal: descriptor.signal,
            module: descriptor.module,
            pid: descriptor.pid,
            reading,
            text: line,
        };
        let result = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            warn!("Failed to write report for {}: {}", descriptor.name(), e);
        }
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn emit(&mut self, descriptor: &PidDescriptor, reading: &Reading, line: &str) {
        (**self).emit(descriptor, reading, line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::{Gear, Obd2Service};

    #[test]
    fn test_json_lines_output() {
        let descriptor = PidDescriptor::new(
            CarModule::Tcm,
            Obd2Service::ManufacturerSpecific,
            0x04FE,
            Signal::Gear,
        );
        let mut sink = JsonLinesSink::new(Vec::new());
        let reading = Reading::Gear(Gear::Numbered(3));
        sink.emit(&descriptor, &reading, "Current Engaged Gear = 3");
        sink.emit(&descriptor, &Reading::Gear(Gear::Reverse), "Current Engaged Gear = Reverse");

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["signal"], "Gear");
        assert_eq!(first["module"], "Tcm");
        assert_eq!(first["pid"], 0x04FE);
        assert_eq!(first["reading"]["unit"], "gear");
        assert_eq!(first["reading"]["value"]["Numbered"], 3);
        assert_eq!(first["text"], "Current Engaged Gear = 3");
    }

    #[test]
    fn test_output_format_names() {
        let format: OutputFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
