//! Bit layouts of the status word reported by the supply and of the command word we send it.

use modular_bitfield::prelude::*;
use strum_macros::{Display, EnumIter};

/// Number of named conditions in the status word. Bits above this are reserved.
pub const STATUS_BIT_COUNT: u32 = 6;

/// Named conditions of the status word, by bit index.
#[derive(Debug, Display, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum StatusBit {
    /// 0: Module is on.
    #[strum(to_string = "on")]
    On = 0,
    /// 1: Generic fault.
    #[strum(to_string = "fault")]
    Fault = 1,
    /// 2: DC link under-voltage.
    #[strum(to_string = "dc under-voltage")]
    DcUndervoltage = 2,
    /// 3: MOSFET over-temperature alarm.
    #[strum(to_string = "mosfet over-temperature")]
    MosfetOverTemperature = 3,
    /// 4: Shunt over-temperature alarm.
    #[strum(to_string = "shunt over-temperature")]
    ShuntOverTemperature = 4,
    /// 5: External interlock tripped.
    #[strum(to_string = "external interlock")]
    ExternalInterlock = 5,
}

impl StatusBit {
    /// Bit index of this condition in the status word.
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Status word as parsed from a `#FDB` reply.
///
/// Reserved bits are kept so that [`StatusBits::bit`] reports exactly what the device sent.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBits {
    pub on: bool,
    pub fault: bool,
    pub dc_undervoltage: bool,
    pub mosfet_over_temperature: bool,
    pub shunt_over_temperature: bool,
    pub external_interlock: bool,
    #[skip]
    __: B26,
}

impl StatusBits {
    /// Whether bit `index` is set. Indices past the word width read as clear.
    pub fn bit(self, index: u32) -> bool {
        index < u32::BITS && u32::from(self) & (1 << index) != 0
    }

    /// Whether the named condition is asserted.
    pub fn is_set(self, condition: StatusBit) -> bool {
        self.bit(condition.index())
    }
}

impl From<u32> for StatusBits {
    fn from(value: u32) -> Self {
        StatusBits::from_bytes(value.to_le_bytes())
    }
}

impl From<StatusBits> for u32 {
    fn from(value: StatusBits) -> Self {
        u32::from_le_bytes(value.into_bytes())
    }
}

/// Flag word of an `FDB` status command.
///
/// `status_request` marks the message as a status request and is always set on the wire.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandWord {
    pub status_request: bool,
    #[skip]
    __: B2,
    pub bulk_on: bool,
    pub slew_rate: bool,
    pub reset: bool,
    pub on_off: bool,
    pub ignore_setting: bool,
}

impl CommandWord {
    /// Ask for a status reply without changing anything on the device.
    pub fn probe() -> Self {
        CommandWord::new().with_ignore_setting(true)
    }

    /// Raw byte as rendered in the command.
    pub fn value(self) -> u8 {
        self.into_bytes()[0]
    }
}

/// Most recent state reported by the supply in a status reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub status: StatusBits,
    /// Amps.
    pub setpoint_current: f64,
    /// Amps.
    pub readback_current: f64,
}

impl DeviceState {
    pub fn is_on(&self) -> bool {
        self.status.on()
    }
}
