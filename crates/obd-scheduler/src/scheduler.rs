//! Poll Loop Implementation
//!
//! Every interval the loop sends one request per registry entry, paced by the
//! inter-frame delay, then drains responses until a receive times out.
//! Sending and draining never overlap, so decode and report of a signal always
//! run back to back.

use crate::sink::ReportSink;
use obd_protocol::{
    build_request_frame, extract_pid, extract_service, is_valid_car_module, BusConfig, CanFrame,
    CanTransport, CarModule, DecodableSignal, Reading, Registry, Signal, NEGATIVE_RESPONSE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Time between request rounds, also the drain receive timeout (default: 250)
    pub interval_ms: u64,
    /// Pause after each request frame (default: 50)
    pub inter_frame_delay_ms: u64,
    /// Wait between bus initialization attempts (default: 1000)
    pub init_backoff_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            inter_frame_delay_ms: 50,
            init_backoff_ms: 1000,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn inter_frame_delay(&self) -> Duration {
        Duration::from_millis(self.inter_frame_delay_ms)
    }

    pub fn init_backoff(&self) -> Duration {
        Duration::from_millis(self.init_backoff_ms)
    }
}

/// Where the loop currently is within an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Waiting for the next interval
    Idle,
    /// Transmitting the request round
    Sending,
    /// Reading responses until a receive times out
    Draining,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Identifier outside every car module range
    Invalid,
    /// Module rejected a request
    NegativeResponse { service: u8, code: u8 },
    /// Valid origin but no registry entry for it
    Unmatched,
    /// Decoded and reported
    Decoded(Signal, Reading),
}

/// Last decoded value per signal
#[derive(Debug, Clone, Default)]
pub struct LastValues {
    values: HashMap<Signal, Reading>,
}

impl LastValues {
    /// Store a reading, replacing the previous one
    pub fn record(&mut self, signal: Signal, reading: Reading) {
        self.values.insert(signal, reading);
    }

    /// Last reading, `None` until the first successful decode
    pub fn get(&self, signal: Signal) -> Option<&Reading> {
        self.values.get(&signal)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Counters kept across the loop lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    /// Completed send and drain rounds
    pub cycles: u64,
    /// Request frames accepted by the transport
    pub requests_sent: u64,
    /// Request frames the transport rejected
    pub transmit_failures: u64,
    /// Inbound frames handled, whatever their outcome
    pub frames_received: u64,
    /// Frames from outside the car module identifier ranges
    pub invalid_frames: u64,
    /// Negative responses from a module
    pub negative_responses: u64,
    /// Valid frames with no registry entry
    pub unmatched_frames: u64,
    /// Frames decoded and reported
    pub decoded: u64,
}

/// Poll loop tying the registry to a CAN transport
pub struct PollLoop<T, S> {
    registry: Registry,
    transport: T,
    sink: S,
    config: PollConfig,
    last_values: LastValues,
    stats: PollStats,
    phase: PollPhase,
}

impl<T: CanTransport, S: ReportSink> PollLoop<T, S> {
    pub fn new(registry: Registry, transport: T, sink: S, config: PollConfig) -> Self {
        info!("Poll loop created with {} PIDs", registry.len());
        Self {
            registry,
            transport,
            sink,
            config,
            last_values: LastValues::default(),
            stats: PollStats::default(),
            phase: PollPhase::Idle,
        }
    }

    /// Bring the bus up, retrying forever at the configured backoff.
    ///
    /// Returns the number of attempts it took.
    pub async fn initialize_bus(&mut self, bus: &BusConfig) -> u32 {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.transport.initialize(bus).await {
                Ok(()) => {
                    info!("CAN bus initialized after {} attempt(s)", attempts);
                    return attempts;
                }
                Err(e) => {
                    warn!(
                        "CAN bus initialization failed (attempt {}): {}, retrying in {:?}",
                        attempts,
                        e,
                        self.config.init_backoff()
                    );
                    tokio::time::sleep(self.config.init_backoff()).await;
                }
            }
        }
    }

    /// Run forever. Termination is process termination.
    pub async fn run(&mut self) {
        info!(
            "Starting poll loop: interval {:?}, inter-frame delay {:?}",
            self.config.interval(),
            self.config.inter_frame_delay()
        );
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One request round followed by one drain phase
    pub async fn run_cycle(&mut self) {
        self.send_requests().await;
        self.drain().await;
        self.phase = PollPhase::Idle;
        self.stats.cycles += 1;
        debug!("Cycle {} done: {:?}", self.stats.cycles, self.stats);
    }

    /// Transmit one request per registry entry, in registry order
    pub async fn send_requests(&mut self) {
        self.phase = PollPhase::Sending;
        let delay = self.config.inter_frame_delay();

        for descriptor in self.registry.iter() {
            let frame = build_request_frame(descriptor.module, descriptor.service, descriptor.pid);
            match self.transport.transmit(&frame).await {
                Ok(()) => {
                    self.stats.requests_sent += 1;
                    debug!("Requested {} ({})", descriptor.name(), frame);
                }
                Err(e) => {
                    self.stats.transmit_failures += 1;
                    warn!("Request for {} failed: {}", descriptor.name(), e);
                }
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Handle inbound frames until one receive times out
    pub async fn drain(&mut self) {
        self.phase = PollPhase::Draining;
        let timeout = self.config.interval();

        loop {
            match self.transport.receive(timeout).await {
                Ok(Some(frame)) => {
                    self.handle_frame(&frame);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Receive failed, ending drain: {}", e);
                    break;
                }
            }
        }
    }

    /// Validate, match, decode and report a single frame
    pub fn handle_frame(&mut self, frame: &CanFrame) -> FrameOutcome {
        self.stats.frames_received += 1;

        if !is_valid_car_module(frame.raw_id()) {
            self.stats.invalid_frames += 1;
            warn!("Unexpected frame {}", frame);
            return FrameOutcome::Invalid;
        }

        if frame.byte(1) == Some(NEGATIVE_RESPONSE) {
            let service = frame.byte(2).unwrap_or(0);
            let code = frame.byte(3).unwrap_or(0);
            self.stats.negative_responses += 1;
            warn!(
                "Negative response from {:08X}: service {:02X}, code {:02X}",
                frame.raw_id(),
                service,
                code
            );
            return FrameOutcome::NegativeResponse { service, code };
        }

        let responder = CarModule::from_response_id(frame.raw_id());
        let service = extract_service(frame, true);
        let pid = extract_pid(frame);

        let Some(descriptor) = self.registry.match_response(responder, service, pid) else {
            self.stats.unmatched_frames += 1;
            debug!("No registry entry for service {:02X} PID {:04X}", service, pid);
            return FrameOutcome::Unmatched;
        };

        let reading = descriptor.signal.decode(frame.data());
        self.last_values.record(descriptor.signal, reading);
        self.stats.decoded += 1;

        if let Some(last) = self.last_values.get(descriptor.signal) {
            let line = descriptor.signal.report(last);
            self.sink.emit(descriptor, last, &line);
        }

        FrameOutcome::Decoded(descriptor.signal, reading)
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn last_values(&self) -> &LastValues {
        &self.last_values
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
