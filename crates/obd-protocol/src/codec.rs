//! OBD-II Frame Codec
//!
//! Single-frame request encoding and response field extraction.
//!
//! Wire layout of the 8 data bytes:
//!
//! | Byte | Request                      | Response                 |
//! |------|------------------------------|--------------------------|
//! | 0    | length (2 or 3)              | length, set by module    |
//! | 1    | service                      | service + 0x40           |
//! | 2    | PID high (or 1-byte PID)     | same                     |
//! | 3    | PID low (or padding)         | same                     |
//! | 4-7  | padding 0xAA                 | signal data              |

use crate::error::ObdError;
use crate::frame::{CanFrame, MAX_DATA_LEN, MAX_STANDARD_ID};
use crate::protocol::{CarModule, Obd2Service, RESPONSE_SERVICE_OFFSET};

/// Filler for unused request bytes. ECUs ignore it, but reference devices send it.
pub const PADDING: u8 = 0xAA;

/// Standard 11-bit OBD-II response identifiers
pub const STANDARD_RESPONSE_RANGE: std::ops::RangeInclusive<u32> = 0x7E8..=0x7EF;

/// Extended 29-bit identifiers accepted from car modules
pub const EXTENDED_RESPONSE_RANGE: std::ops::RangeInclusive<u32> = 0x1800_0000..=0x18FF_FFFF;

/// Number of bytes a PID occupies on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidWidth {
    One,
    Two,
}

impl PidWidth {
    /// Width needed to carry `pid`
    pub fn of(pid: u16) -> Self {
        if pid > 0xFF {
            PidWidth::Two
        } else {
            PidWidth::One
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            PidWidth::One => 1,
            PidWidth::Two => 2,
        }
    }
}

/// Build the 8-byte request frame for `pid` on `service` addressed to `module`
pub fn build_request_frame(module: CarModule, service: Obd2Service, pid: u16) -> CanFrame {
    let id = module.request_id();
    let mut data = [PADDING; MAX_DATA_LEN];

    let width = PidWidth::of(pid);
    data[0] = 1 + width.bytes() as u8;
    data[1] = service.code();
    match width {
        PidWidth::Two => data[2..4].copy_from_slice(&pid.to_be_bytes()),
        PidWidth::One => data[2] = pid as u8,
    }

    CanFrame::from_parts(id, id > MAX_STANDARD_ID, data)
}

/// Build the positive response a module would send for a request.
///
/// Only used to stand in for real modules; the monitor never transmits these.
pub fn build_response_frame(
    module: CarModule,
    service: Obd2Service,
    pid: u16,
    payload: &[u8],
) -> Result<CanFrame, ObdError> {
    let id = module
        .response_id()
        .ok_or(ObdError::UnknownModule(module.request_id()))?;

    let width = PidWidth::of(pid);
    let header = 2 + width.bytes();
    if header + payload.len() > MAX_DATA_LEN {
        return Err(ObdError::PayloadTooLong(header + payload.len()));
    }

    let mut data = [PADDING; MAX_DATA_LEN];
    data[0] = (header - 1 + payload.len()) as u8;
    data[1] = service.response_code();
    match width {
        PidWidth::Two => data[2..4].copy_from_slice(&pid.to_be_bytes()),
        PidWidth::One => data[2] = pid as u8,
    }
    data[header..header + payload.len()].copy_from_slice(payload);

    Ok(CanFrame::from_parts(id, true, data))
}

/// Read the PID field, assuming the 2-byte manufacturer PID layout
pub fn extract_pid(frame: &CanFrame) -> u16 {
    extract_pid_with_width(frame, PidWidth::Two)
}

/// Read the PID field for an explicit PID width. Missing bytes read as zero.
pub fn extract_pid_with_width(frame: &CanFrame, width: PidWidth) -> u16 {
    let high = frame.byte(2).unwrap_or(0);
    match width {
        PidWidth::Two => u16::from_be_bytes([high, frame.byte(3).unwrap_or(0)]),
        PidWidth::One => high as u16,
    }
}

/// Read the service code.
///
/// Responses carry `service + 0x40`; pass `is_response` to undo the offset.
pub fn extract_service(frame: &CanFrame, is_response: bool) -> u8 {
    let raw = frame.byte(1).unwrap_or(0);
    if is_response {
        raw.wrapping_sub(RESPONSE_SERVICE_OFFSET)
    } else {
        raw
    }
}

/// Coarse origin check for inbound frames.
///
/// The hardware acceptance filter does the real narrowing; this only rejects
/// identifiers no car module can have sent.
pub fn is_valid_car_module(id: u32) -> bool {
    STANDARD_RESPONSE_RANGE.contains(&id) || EXTENDED_RESPONSE_RANGE.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_module() -> impl Strategy<Value = CarModule> {
        prop_oneof![
            Just(CarModule::All),
            Just(CarModule::Ecm),
            Just(CarModule::Tcm),
        ]
    }

    fn any_service() -> impl Strategy<Value = Obd2Service> {
        prop_oneof![
            Just(Obd2Service::CurrentData),
            Just(Obd2Service::TroubleCodes),
            Just(Obd2Service::VehicleInfo),
            Just(Obd2Service::ManufacturerSpecific),
        ]
    }

    #[test]
    fn test_encode_two_byte_pid() {
        let frame = build_request_frame(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1000);
        assert_eq!(frame.raw_id(), 0x18DA10F1);
        assert!(frame.is_extended());
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.data(), &[0x03, 0x22, 0x10, 0x00, 0xAA, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_encode_one_byte_pid() {
        let frame = build_request_frame(CarModule::All, Obd2Service::CurrentData, 0x0C);
        assert_eq!(frame.raw_id(), 0x18DB33F1);
        assert_eq!(frame.data(), &[0x02, 0x01, 0x0C, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(extract_pid_with_width(&frame, PidWidth::One), 0x0C);
    }

    #[test]
    fn test_extract_response_service() {
        let frame = CanFrame::from_raw(0x18DAF110, &[0x05, 0x62, 0x10, 0x00, 0x1F, 0x40]).unwrap();
        assert_eq!(extract_service(&frame, true), 0x22);
        assert_eq!(extract_service(&frame, false), 0x62);
        assert_eq!(extract_pid(&frame), 0x1000);
    }

    #[test]
    fn test_extract_from_short_frame() {
        let frame = CanFrame::from_raw(0x7E8, &[0x01]).unwrap();
        assert_eq!(extract_pid(&frame), 0);
        assert_eq!(extract_service(&frame, false), 0);
    }

    #[test]
    fn test_build_response_frame() {
        let frame = build_response_frame(
            CarModule::Tcm,
            Obd2Service::ManufacturerSpecific,
            0x04FE,
            &[0x03],
        )
        .unwrap();
        assert_eq!(frame.raw_id(), 0x18DAF118);
        assert_eq!(frame.data(), &[0x04, 0x62, 0x04, 0xFE, 0x03, 0xAA, 0xAA, 0xAA]);
        assert!(build_response_frame(CarModule::All, Obd2Service::CurrentData, 0x0C, &[]).is_err());
        assert!(build_response_frame(CarModule::Ecm, Obd2Service::CurrentData, 0x1000, &[0; 5]).is_err());
    }

    #[test]
    fn test_origin_bounds() {
        assert!(is_valid_car_module(0x7E8));
        assert!(is_valid_car_module(0x7EF));
        assert!(is_valid_car_module(0x1800_0000));
        assert!(is_valid_car_module(0x18FF_FFFF));
        assert!(!is_valid_car_module(0x7E7));
        assert!(!is_valid_car_module(0x7F0));
        assert!(!is_valid_car_module(0x17FF_FFFF));
        assert!(!is_valid_car_module(0x1900_0000));
    }

    proptest! {
        #[test]
        fn prop_request_fields_recoverable(
            module in any_module(),
            service in any_service(),
            pid in any::<u16>(),
        ) {
            let frame = build_request_frame(module, service, pid);
            let width = PidWidth::of(pid);
            prop_assert_eq!(extract_pid_with_width(&frame, width), pid);
            prop_assert_eq!(extract_service(&frame, false), service.code());
            prop_assert_eq!(frame.raw_id(), module.request_id());
            prop_assert_eq!(frame.data()[0] as usize, 1 + width.bytes());
            prop_assert!(frame.data()[4..].iter().all(|&b| b == PADDING));
        }

        #[test]
        fn prop_response_service_offset_undone(service in any_service(), pid in 0x100u16..) {
            let frame = build_response_frame(CarModule::Ecm, service, pid, &[0, 0]).unwrap();
            prop_assert_eq!(extract_service(&frame, true), service.code());
            prop_assert_eq!(extract_pid(&frame), pid);
        }

        #[test]
        fn prop_origin_check_matches_ranges(id in 0u32..=0x1FFF_FFFF) {
            let expected = (0x7E8..=0x7EF).contains(&id) || (id >> 24) == 0x18;
            prop_assert_eq!(is_valid_car_module(id), expected);
        }
    }
}
