//! OBD-II Poll Loop
//!
//! Sends one request per registered PID every interval and dispatches the
//! responses to the matching signal decoder and the report sink.

mod scheduler;
mod sink;

pub use scheduler::{FrameOutcome, LastValues, PollConfig, PollLoop, PollPhase, PollStats};
pub use sink::{JsonLinesSink, LogSink, OutputFormat, ReportSink};
