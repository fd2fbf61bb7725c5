//! PID Registry
//!
//! Fixed table tying each signal to the module, service and PID it is read
//! from. Lookups are linear scans; the table holds a handful of entries.

use crate::codec::PidWidth;
use crate::pid::{DecodableSignal, Signal};
use crate::protocol::{CarModule, Obd2Service};

/// One registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidDescriptor {
    /// Module the request is addressed to
    pub module: CarModule,
    /// Diagnostic service of the request
    pub service: Obd2Service,
    /// 1- or 2-byte parameter id
    pub pid: u16,
    /// Decoder for the response payload
    pub signal: Signal,
}

impl PidDescriptor {
    pub const fn new(module: CarModule, service: Obd2Service, pid: u16, signal: Signal) -> Self {
        Self {
            module,
            service,
            pid,
            signal,
        }
    }

    pub fn name(&self) -> &'static str {
        self.signal.name()
    }

    pub fn pid_width(&self) -> PidWidth {
        PidWidth::of(self.pid)
    }
}

/// Manufacturer PIDs polled from the vehicle, in polling order
pub const VEHICLE_PIDS: &[PidDescriptor] = &[
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1000, Signal::EngineRpm),
    PidDescriptor::new(CarModule::Tcm, Obd2Service::ManufacturerSpecific, 0x04FE, Signal::Gear),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1302, Signal::EngineOilTemp),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x19BD, Signal::BatteryIbs),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1955, Signal::BatteryVoltage),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1956, Signal::AtmosphericPressure),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x195A, Signal::BoostPressure),
    PidDescriptor::new(CarModule::Ecm, Obd2Service::ManufacturerSpecific, 0x1935, Signal::ExternalTemp),
];

/// Immutable PID table
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<PidDescriptor>,
}

impl Registry {
    pub fn new(entries: Vec<PidDescriptor>) -> Self {
        Self { entries }
    }

    /// Exact lookup by addressing triple
    pub fn lookup(&self, module: CarModule, service: Obd2Service, pid: u16) -> Option<&PidDescriptor> {
        self.entries
            .iter()
            .find(|d| d.module == module && d.service == service && d.pid == pid)
    }

    /// Find the entry a response belongs to. First match wins.
    ///
    /// `responder` is the module resolved from the response identifier; when
    /// it could not be resolved, any module is accepted. Broadcast entries
    /// accept any responder.
    pub fn match_response(
        &self,
        responder: Option<CarModule>,
        service: u8,
        pid: u16,
    ) -> Option<&PidDescriptor> {
        self.entries.iter().find(|d| {
            d.service.code() == service
                && d.pid == pid
                && (d.module == CarModule::All
                    || responder.map_or(true, |module| module == d.module))
        })
    }

    /// Entries in polling order
    pub fn iter(&self) -> impl Iterator<Item = &PidDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(VEHICLE_PIDS.to_vec())
    }
}
