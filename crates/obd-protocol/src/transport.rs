//! CAN transport abstraction
//!
//! The physical CAN controller lives behind [`CanTransport`] so the protocol
//! layer can run against real drivers or the in-process [`SimulatedBus`].
//!
//! [`SimulatedBus`]: crate::SimulatedBus

use crate::error::ObdError;
use crate::frame::CanFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hardware acceptance filter as a code/mask pair.
///
/// An identifier is accepted when every bit set in `mask` matches `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceFilter {
    /// Identifier bits to match
    pub code: u32,
    /// Bits of `code` that must match
    pub mask: u32,
}

impl AcceptanceFilter {
    /// Filter that lets every frame through
    pub const ACCEPT_ALL: Self = Self { code: 0, mask: 0 };

    pub fn accepts(&self, id: u32) -> bool {
        id & self.mask == self.code & self.mask
    }
}

impl Default for AcceptanceFilter {
    /// Accepts exactly 0x18000000..=0x18FFFFFF
    fn default() -> Self {
        Self {
            code: 0x1800_0000,
            mask: 0x1F00_0000,
        }
    }
}

/// CAN controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Bus bitrate in bit/s
    pub bitrate: u32,
    /// Transceiver TX pin
    pub tx_pin: u8,
    /// Transceiver RX pin
    pub rx_pin: u8,
    /// Depth of the controller transmit queue
    pub tx_queue_depth: usize,
    /// Depth of the controller receive queue
    pub rx_queue_depth: usize,
    /// Hardware acceptance filter
    pub filter: AcceptanceFilter,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bitrate: 500_000,
            tx_pin: 5,
            rx_pin: 4,
            tx_queue_depth: 10,
            rx_queue_depth: 10,
            filter: AcceptanceFilter::default(),
        }
    }
}

/// Contract to bring up a CAN controller and move frames across it
#[async_trait]
pub trait CanTransport: Send {
    /// Configure and start the controller
    async fn initialize(&mut self, config: &BusConfig) -> Result<(), ObdError>;

    /// Queue one frame for transmission
    async fn transmit(&mut self, frame: &CanFrame) -> Result<(), ObdError>;

    /// Wait up to `timeout` for the next accepted frame.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, ObdError>;
}
