//! OBD-II over CAN Protocol Implementation
//!
//! This crate provides single-frame OBD-II request encoding, response field
//! extraction, the manufacturer PID registry and its signal decoders, and the
//! transport contract a CAN controller driver implements.

mod codec;
mod error;
mod frame;
mod pid;
mod protocol;
mod registry;
mod sim;
mod transport;

pub use codec::{
    build_request_frame, build_response_frame, extract_pid, extract_pid_with_width,
    extract_service, is_valid_car_module, PidWidth, PADDING,
};
pub use error::ObdError;
pub use frame::{CanFrame, MAX_DATA_LEN};
pub use pid::{celsius_to_fahrenheit, DecodableSignal, Gear, Reading, Signal};
pub use protocol::{CarModule, Obd2Service, NEGATIVE_RESPONSE, RESPONSE_SERVICE_OFFSET};
pub use registry::{PidDescriptor, Registry, VEHICLE_PIDS};
pub use sim::SimulatedBus;
pub use transport::{AcceptanceFilter, BusConfig, CanTransport};
