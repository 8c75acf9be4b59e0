//! Logical addresses the host uses to reach values on the supply.
//!
//! There is one address space per value type, matching how the host reads and writes them.

use strum_macros::{Display, EnumIter};

/// Which kind of access was attempted, for error reporting.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    #[strum(to_string = "int32 read")]
    Int32Read,
    #[strum(to_string = "int32 write")]
    Int32Write,
    #[strum(to_string = "float64 read")]
    Float64Read,
    #[strum(to_string = "float64 write")]
    Float64Write,
    #[strum(to_string = "octet read")]
    OctetRead,
    #[strum(to_string = "float32 array write")]
    ArrayWrite,
}

/// Floating point values.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum FloatAddress {
    /// __R/W__ - Output current setting, amps.
    SetpointCurrent = 0,
    /// __R__ - Measured output current, amps. Delivered through notifications only.
    ReadbackCurrent = 1,
    /// __R/W__ - Proportional gain of the current loop.
    Kp = 13,
    /// __R/W__ - Integral gain of the current loop.
    Ki = 14,
    /// __R/W__ - Derivative gain of the current loop.
    Kd = 15,
    /// __R__ - DC link voltage.
    BulkVoltage = 40,
    /// __R__ - Output stage temperature.
    FetTemperature = 41,
    /// __R__ - Shunt temperature.
    ShuntTemperature = 42,
    /// __R__ - Output voltage.
    OutputVoltage = 43,
}

impl FloatAddress {
    /// EEPROM index of a loop gain, which is also its address.
    pub fn gain_index(self) -> Option<u32> {
        match self {
            FloatAddress::Kp | FloatAddress::Ki | FloatAddress::Kd => Some(self as u32),
            _ => None,
        }
    }
}

impl TryFrom<u32> for FloatAddress {
    type Error = ();
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use FloatAddress as FA;
        match value {
            0 => Ok(FA::SetpointCurrent),
            1 => Ok(FA::ReadbackCurrent),
            13 => Ok(FA::Kp),
            14 => Ok(FA::Ki),
            15 => Ok(FA::Kd),
            40 => Ok(FA::BulkVoltage),
            41 => Ok(FA::FetTemperature),
            42 => Ok(FA::ShuntTemperature),
            43 => Ok(FA::OutputVoltage),
            _ => Err(()),
        }
    }
}

/// Integer values and actions.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum IntAddress {
    /// __R__ - Whether setpoint changes are ramped.
    SlewModeRead = 50,
    /// __R__ - Poll the supply so listeners get fresh values.
    ForceReadback = 99,
    /// __W__ - Turn the supply on (non-zero) or off (zero).
    SupplyOn = 100,
    /// __W__ - Clear latched faults.
    Reset = 101,
    /// __W__ - Ramp (non-zero) or step (zero) subsequent setpoint changes.
    SlewModeWrite = 102,
}

impl TryFrom<u32> for IntAddress {
    type Error = ();
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use IntAddress as IA;
        match value {
            50 => Ok(IA::SlewModeRead),
            99 => Ok(IA::ForceReadback),
            100 => Ok(IA::SupplyOn),
            101 => Ok(IA::Reset),
            102 => Ok(IA::SlewModeWrite),
            _ => Err(()),
        }
    }
}

/// Identification string.
pub const OCTET_IDENTIFICATION: u32 = 0;

/// Waveform table.
pub const ARRAY_WAVEFORM: u32 = 0;
