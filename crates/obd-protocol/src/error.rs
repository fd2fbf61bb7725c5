//! OBD-II Error Types

use thiserror::Error;

/// Errors that can occur during OBD-II over CAN communication
#[derive(Debug, Error)]
pub enum ObdError {
    /// CAN controller could not be brought up
    #[error("CAN bus initialization failed: {0}")]
    TransportInit(String),

    /// Frame could not be queued for transmission
    #[error("CAN transmit failed for {id:08X}: {reason}")]
    Transmit { id: u32, reason: String },

    /// Receive path reported a bus or driver fault
    #[error("CAN receive failed: {0}")]
    Receive(String),

    /// Payload does not fit in a classic CAN frame
    #[error("Payload of {0} bytes exceeds the 8 byte CAN limit")]
    PayloadTooLong(usize),

    /// Identifier does not fit in a 29-bit extended id
    #[error("Identifier {0:08X} exceeds the 29-bit extended range")]
    InvalidIdentifier(u32),

    /// Identifier is not one of the known car modules
    #[error("Unknown car module identifier {0:08X}")]
    UnknownModule(u32),

    /// Byte is not one of the supported service codes
    #[error("Unknown OBD-II service {0:02X}")]
    UnknownService(u8),
}
