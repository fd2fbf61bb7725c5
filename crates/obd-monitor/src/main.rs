//! OBD-II CAN Monitor - Main Entry Point

use anyhow::Context;
use obd_monitor::{init_logging, report_sink, MonitorConfig};
use obd_protocol::{Registry, SimulatedBus};
use obd_scheduler::PollLoop;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::load().context("loading configuration")?;
    init_logging(&config.logging).context("installing tracing subscriber")?;

    info!("=== OBD-II CAN Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let registry = Registry::default();
    let bus = SimulatedBus::new(registry.clone());
    let sink = report_sink(&config.output);

    let mut poll = PollLoop::new(registry, bus, sink, config.poll.clone());
    poll.initialize_bus(&config.bus).await;

    tokio::select! {
        _ = poll.run() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    info!("Interrupted after {} cycles", poll.stats().cycles);

    Ok(())
}
