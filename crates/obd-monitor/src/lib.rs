//! Vehicle OBD-II CAN Monitor
//!
//! Process setup around the poll loop: configuration, logging and the choice
//! of report sink.

mod settings;

pub use settings::{ConfigError, LoggingConfig, MonitorConfig, OutputConfig, CONFIG_FILE, ENV_PREFIX};

use obd_scheduler::{JsonLinesSink, LogSink, OutputFormat, ReportSink};
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Install the global tracing subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<(), SetGlobalDefaultError> {
    let level = config.max_level().unwrap_or(tracing::Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Report sink for the configured output format
pub fn report_sink(output: &OutputConfig) -> Box<dyn ReportSink> {
    match output.format {
        OutputFormat::Text => Box::new(LogSink),
        OutputFormat::Json => Box::new(JsonLinesSink::new(std::io::stdout())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::{BusConfig, Registry, SimulatedBus};
    use obd_scheduler::{PollConfig, PollLoop};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_poll_cycle_runs_on_worker_thread() {
        let registry = Registry::default();
        let bus = SimulatedBus::new(registry.clone());
        let sink = report_sink(&OutputConfig::default());
        let mut poll = PollLoop::new(registry, bus, sink, PollConfig::default());

        let stats = tokio::spawn(async move {
            poll.initialize_bus(&BusConfig::default()).await;
            poll.run_cycle().await;
            poll.stats().clone()
        })
        .await
        .unwrap();

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.decoded, 8);
    }
}
