//! OBD-II Addressing: car modules and diagnostic services

use crate::error::ObdError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic tester address used as the source byte of every request
pub const TESTER_ADDRESS: u8 = 0xF1;

/// Prefix of physically addressed extended identifiers (`0x18DA_xxyy`)
const PHYSICAL_PREFIX: u32 = 0x18DA_0000;

/// Offset a module adds to the service code of a positive response
pub const RESPONSE_SERVICE_OFFSET: u8 = 0x40;

/// Service byte of a negative response
pub const NEGATIVE_RESPONSE: u8 = 0x7F;

/// Addressing targets on the vehicle bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarModule {
    /// Functional broadcast to every module (0x18DB33F1)
    All,
    /// Engine control module (0x18DA10F1)
    Ecm,
    /// Transmission control module (0x18DA18F1)
    Tcm,
}

impl CarModule {
    /// Extended identifier that requests to this module are sent on
    pub const fn request_id(&self) -> u32 {
        match self {
            CarModule::All => 0x18DB_33F1,
            CarModule::Ecm => 0x18DA_10F1,
            CarModule::Tcm => 0x18DA_18F1,
        }
    }

    /// Node address byte of the module, if physically addressable
    pub const fn node_address(&self) -> Option<u8> {
        match self {
            CarModule::All => None,
            CarModule::Ecm => Some(0x10),
            CarModule::Tcm => Some(0x18),
        }
    }

    /// Identifier the module answers on (`0x18DAF1xx`)
    pub fn response_id(&self) -> Option<u32> {
        self.node_address()
            .map(|node| PHYSICAL_PREFIX | (TESTER_ADDRESS as u32) << 8 | node as u32)
    }

    /// Resolve the module that sent a response frame
    pub fn from_response_id(id: u32) -> Option<Self> {
        if id & 0xFFFF_FF00 != PHYSICAL_PREFIX | (TESTER_ADDRESS as u32) << 8 {
            return None;
        }
        [CarModule::Ecm, CarModule::Tcm]
            .into_iter()
            .find(|module| module.node_address() == Some(id as u8))
    }

    /// Resolve a module from its request identifier
    pub fn from_request_id(id: u32) -> Result<Self, ObdError> {
        [CarModule::All, CarModule::Ecm, CarModule::Tcm]
            .into_iter()
            .find(|module| module.request_id() == id)
            .ok_or(ObdError::UnknownModule(id))
    }
}

impl fmt::Display for CarModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CarModule::All => "ALL",
            CarModule::Ecm => "ECM",
            CarModule::Tcm => "TCM",
        };
        f.write_str(name)
    }
}

/// OBD-II diagnostic services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Obd2Service {
    /// Current powertrain data (0x01)
    CurrentData = 0x01,
    /// Stored diagnostic trouble codes (0x03)
    TroubleCodes = 0x03,
    /// Vehicle information (0x09)
    VehicleInfo = 0x09,
    /// Manufacturer specific read data by identifier (0x22)
    ManufacturerSpecific = 0x22,
}

impl Obd2Service {
    /// Service code as sent on the wire
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Service code a positive response echoes back
    pub fn response_code(&self) -> u8 {
        self.code() + RESPONSE_SERVICE_OFFSET
    }
}

impl TryFrom<u8> for Obd2Service {
    type Error = ObdError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Obd2Service::CurrentData),
            0x03 => Ok(Obd2Service::TroubleCodes),
            0x09 => Ok(Obd2Service::VehicleInfo),
            0x22 => Ok(Obd2Service::ManufacturerSpecific),
            other => Err(ObdError::UnknownService(other)),
        }
    }
}
