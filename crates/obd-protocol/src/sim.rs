//! Simulated vehicle bus
//!
//! Stands in for the ECM and TCM so the monitor runs without hardware. Every
//! request for a registered PID is answered with deterministic synthetic data.

use crate::codec::{build_response_frame, PADDING};
use crate::error::ObdError;
use crate::frame::{CanFrame, MAX_DATA_LEN};
use crate::pid::Signal;
use crate::protocol::{CarModule, NEGATIVE_RESPONSE};
use crate::registry::Registry;
use crate::transport::{BusConfig, CanTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Negative response code: request out of range
const NRC_REQUEST_OUT_OF_RANGE: u8 = 0x31;

/// In-process CAN bus with simulated car modules attached
pub struct SimulatedBus {
    registry: Registry,
    config: Option<BusConfig>,
    /// Frames waiting to be received, already past the acceptance filter
    inbox: VecDeque<CanFrame>,
    /// Frames transmitted by the tester
    sent: Vec<CanFrame>,
    /// Number of upcoming initialize calls that should fail
    failing_inits: u32,
    tick: u32,
}

impl SimulatedBus {
    /// Simulate modules answering for every entry in `registry`
    pub fn new(registry: Registry) -> Self {
        info!("Creating simulated CAN bus with {} PIDs", registry.len());
        Self {
            registry,
            config: None,
            inbox: VecDeque::new(),
            sent: Vec::new(),
            failing_inits: 0,
            tick: 0,
        }
    }

    /// Make the next `count` initialization attempts fail
    pub fn with_failing_inits(mut self, count: u32) -> Self {
        self.failing_inits = count;
        self
    }

    /// Place a frame on the bus as if another node had sent it
    pub fn inject(&mut self, frame: CanFrame) {
        self.deliver(frame);
    }

    /// Frames transmitted so far
    pub fn sent(&self) -> &[CanFrame] {
        &self.sent
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    fn deliver(&mut self, frame: CanFrame) {
        let Some(config) = &self.config else {
            return;
        };
        if !config.filter.accepts(frame.raw_id()) {
            debug!("Filter dropped {}", frame);
            return;
        }
        if self.inbox.len() >= config.rx_queue_depth {
            warn!("RX queue full, dropping {}", frame);
            return;
        }
        self.inbox.push_back(frame);
    }

    fn answer(&mut self, request: &CanFrame) {
        let Ok(target) = CarModule::from_request_id(request.raw_id()) else {
            return;
        };
        let data = request.data();
        if data.len() < 3 {
            return;
        }
        let pid = match data[0] {
            2 => data[2] as u16,
            3 if data.len() >= 4 => u16::from_be_bytes([data[2], data[3]]),
            _ => return,
        };
        let service_code = data[1];

        let responses: Vec<_> = self
            .registry
            .iter()
            .filter(|d| d.service.code() == service_code && d.pid == pid)
            .filter(|d| target == CarModule::All || d.module == target)
            .map(|d| (Self::responder(d.module), d.service, d.signal))
            .collect();

        if responses.is_empty() {
            if let Some(id) = target.response_id() {
                let nrc = [0x03, NEGATIVE_RESPONSE, service_code, NRC_REQUEST_OUT_OF_RANGE];
                let mut frame = [PADDING; MAX_DATA_LEN];
                frame[..nrc.len()].copy_from_slice(&nrc);
                if let Ok(frame) = CanFrame::new(id, true, &frame) {
                    self.deliver(frame);
                }
            }
            return;
        }

        for (module, service, signal) in responses {
            let payload = self.synthesize(signal);
            match build_response_frame(module, service, pid, &payload) {
                Ok(frame) => self.deliver(frame),
                Err(e) => warn!("Simulated {} could not answer {:04X}: {}", module, pid, e),
            }
        }
    }

    /// Physical module that answers for an entry. Broadcast entries are
    /// answered by the ECM.
    fn responder(module: CarModule) -> CarModule {
        match module {
            CarModule::All => CarModule::Ecm,
            physical => physical,
        }
    }

    /// Two signal bytes, placed at payload offsets 4 and 5
    fn synthesize(&self, signal: Signal) -> [u8; 2] {
        let t = self.tick;
        match signal {
            Signal::EngineRpm => {
                let rpm = 800 + (t * 37) % 2700;
                ((rpm * 4) as u16).to_be_bytes()
            }
            Signal::Gear => {
                let gears = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x10];
                [gears[(t as usize / 8) % gears.len()], 0]
            }
            Signal::EngineOilTemp => [0, (80 + t % 30) as u8],
            Signal::BatteryIbs => [(70 + t % 30) as u8, 0],
            Signal::BatteryVoltage => [0, (120 + t % 25) as u8],
            Signal::AtmosphericPressure => 1013u16.to_be_bytes(),
            Signal::BoostPressure => ((1000 + (t * 13) % 1200) as u16).to_be_bytes(),
            Signal::ExternalTemp => [(120 + t % 10) as u8, 0],
        }
    }
}

#[async_trait]
impl CanTransport for SimulatedBus {
    async fn initialize(&mut self, config: &BusConfig) -> Result<(), ObdError> {
        if self.failing_inits > 0 {
            self.failing_inits -= 1;
            return Err(ObdError::TransportInit("simulated controller not ready".to_string()));
        }
        info!(
            "Simulated CAN bus up at {} bit/s, filter {:08X}/{:08X}",
            config.bitrate, config.filter.code, config.filter.mask
        );
        self.config = Some(config.clone());
        Ok(())
    }

    async fn transmit(&mut self, frame: &CanFrame) -> Result<(), ObdError> {
        if self.config.is_none() {
            return Err(ObdError::Transmit {
                id: frame.raw_id(),
                reason: "bus not initialized".to_string(),
            });
        }
        debug!("TX {}", frame);
        self.sent.push(*frame);
        self.tick = self.tick.wrapping_add(1);
        self.answer(frame);
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, ObdError> {
        if self.config.is_none() {
            return Err(ObdError::Receive("bus not initialized".to_string()));
        }
        match self.inbox.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{build_request_frame, extract_pid, extract_service};
    use crate::protocol::Obd2Service;
    use crate::registry::PidDescriptor;

    const TIMEOUT: Duration = Duration::from_millis(250);

    async fn bus() -> SimulatedBus {
        let mut bus = SimulatedBus::new(Registry::default());
        bus.initialize(&BusConfig::default()).await.unwrap();
        bus
    }

    #[tokio::test(start_paused = true)]
    async fn test_answers_registered_pid() {
        let mut bus = bus().await;
        let request = build_request_frame(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1000);
        bus.transmit(&request).await.unwrap();

        let response = bus.receive(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(response.raw_id(), 0x18DAF110);
        assert_eq!(extract_service(&response, true), 0x22);
        assert_eq!(extract_pid(&response), 0x1000);
        assert!(bus.receive(TIMEOUT).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_entry_answered_by_ecm() {
        let registry = Registry::new(vec![PidDescriptor::new(
            CarModule::All,
            Obd2Service::ManufacturerSpecific,
            0x1000,
            Signal::EngineRpm,
        )]);
        let mut bus = SimulatedBus::new(registry);
        bus.initialize(&BusConfig::default()).await.unwrap();

        let request = build_request_frame(CarModule::All, Obd2Service::ManufacturerSpecific, 0x1000);
        bus.transmit(&request).await.unwrap();

        let response = bus.receive(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(response.raw_id(), 0x18DAF110);
        assert_eq!(extract_pid(&response), 0x1000);
        assert!(bus.receive(TIMEOUT).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_response_for_unknown_pid() {
        let mut bus = bus().await;
        let request = build_request_frame(CarModule::Tcm, Obd2Service::ManufacturerSpecific, 0x1000);
        bus.transmit(&request).await.unwrap();

        let response = bus.receive(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(response.raw_id(), 0x18DAF118);
        assert_eq!(&response.data()[..4], &[0x03, 0x7F, 0x22, 0x31]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_drops_standard_frames() {
        let mut bus = bus().await;
        bus.inject(CanFrame::from_raw(0x7E8, &[0x03, 0x41, 0x0C, 0x00]).unwrap());
        bus.inject(CanFrame::from_raw(0x1900_0000, &[0x00]).unwrap());
        assert!(bus.receive(TIMEOUT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_init_failures_then_success() {
        let mut bus = SimulatedBus::new(Registry::default()).with_failing_inits(2);
        let config = BusConfig::default();
        assert!(bus.initialize(&config).await.is_err());
        assert!(bus.initialize(&config).await.is_err());
        assert!(bus.initialize(&config).await.is_ok());
        assert!(bus.is_initialized());
    }

    #[tokio::test]
    async fn test_transmit_requires_initialize() {
        let mut bus = SimulatedBus::new(Registry::default());
        let request = build_request_frame(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1000);
        assert!(matches!(
            bus.transmit(&request).await,
            Err(ObdError::Transmit { id: 0x18DA10F1, .. })
        ));
    }
}
