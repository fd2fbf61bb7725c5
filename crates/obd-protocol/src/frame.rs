//! Classic CAN frame as seen by the OBD-II layer

use crate::error::ObdError;
use embedded_can::{ExtendedId, Id, StandardId};
use std::fmt;

/// Maximum payload of a classic CAN frame
pub const MAX_DATA_LEN: usize = 8;

/// Highest identifier representable in 11-bit standard addressing
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Highest identifier representable in 29-bit extended addressing
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// A classic (non-FD) CAN data frame.
///
/// Frames are immutable once built. The transport creates them on receive and
/// the codec creates them on send.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u32,
    extended: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
}

impl CanFrame {
    /// Build a frame with an explicit addressing mode
    pub fn new(id: u32, extended: bool, data: &[u8]) -> Result<Self, ObdError> {
        if data.len() > MAX_DATA_LEN {
            return Err(ObdError::PayloadTooLong(data.len()));
        }
        let limit = if extended { MAX_EXTENDED_ID } else { MAX_STANDARD_ID };
        if id > limit {
            return Err(ObdError::InvalidIdentifier(id));
        }

        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            extended,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    /// Full-length frame from already validated parts
    pub(crate) fn from_parts(id: u32, extended: bool, data: [u8; MAX_DATA_LEN]) -> Self {
        Self {
            id,
            extended,
            dlc: MAX_DATA_LEN as u8,
            data,
        }
    }

    /// Build a frame whose addressing mode follows from the identifier magnitude
    pub fn from_raw(id: u32, data: &[u8]) -> Result<Self, ObdError> {
        Self::new(id, id > MAX_STANDARD_ID, data)
    }

    /// Raw identifier
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    /// Whether the identifier uses 29-bit addressing
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Declared data length (0-8)
    pub fn len(&self) -> usize {
        self.dlc as usize
    }

    /// True when the frame carries no data bytes
    pub fn is_empty(&self) -> bool {
        self.dlc == 0
    }

    /// Data bytes up to the declared length
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Byte at `index`, or `None` past the declared length
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data().get(index).copied()
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanFrame({self})")
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "{:08X} [{}]", self.id, self.dlc)?;
        } else {
            write!(f, "{:03X} [{}]", self.id, self.dlc)?;
        }
        for byte in self.data() {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => CanFrame::new(id.as_raw() as u32, false, data).ok(),
            Id::Extended(id) => CanFrame::new(id.as_raw(), true, data).ok(),
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        // OBD-II never uses remote frames
        None
    }

    fn is_extended(&self) -> bool {
        self.extended
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        if self.extended {
            ExtendedId::new(self.id)
                .map(Id::Extended)
                .unwrap_or(Id::Extended(ExtendedId::MAX))
        } else {
            StandardId::new(self.id as u16)
                .map(Id::Standard)
                .unwrap_or(Id::Standard(StandardId::MAX))
        }
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}
