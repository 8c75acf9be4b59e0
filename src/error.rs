//! Our error types for the Easy Driver power supplies.

use thiserror::Error;

use crate::{address::Operation, reply::MalformedReply};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Easy Driver communications.
///
/// `I` is the error type of the underlying transport.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    /// The transport failed on every attempt, `last` is the final low-level failure.
    #[error("No reply after {attempts} attempts: {last:?}")]
    NoReply { attempts: u32, last: I },
    #[error(transparent)]
    MalformedReply(#[from] MalformedReply),
    #[error("Invalid {operation} address {address}")]
    InvalidAddress { address: u32, operation: Operation },
    #[error("Device busy: {0}")]
    DeviceBusy(&'static str),
    #[error("Formatted message too long to send")]
    CommandTooLong,
    /// No safe ramp-down pause exists for the reported setpoint, so the supply was left on.
    #[error("Can't ramp down from setpoint {setpoint}")]
    InvalidRamp { setpoint: f64 },
}

impl<I: embedded_io::Error> Error<I> {
    /// Whether retrying the same request later could succeed.
    ///
    /// Only transport loss is transient; the other kinds mean the device disagreed
    /// with us or the caller asked for something unsupported.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NoReply { .. })
    }
}
