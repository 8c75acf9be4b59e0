//! This crate provides an interface for communicating with and controlling CAEN ELS Easy Driver
//! power supplies. The older SY2604 system speaks the same protocol and should work too.
//!
//! The supply is driven with short ASCII commands terminated by `\r`, over TCP or a serial line.
//! Each status command (`FDB`) returns the status word, the current setpoint and the measured
//! current, which the driver keeps and pushes to any registered listeners.
//!
//! Entry point is [`driver::EasyDriver`]. It needs:
//! * a [`line::Transport`]. [`line::SerialLine`] wraps any port implementing
//!   [`embedded_io::Read`], [`embedded_io::Write`] & [`embedded_io::ReadReady`].
//! * a [`notify::NotificationSink`] through which the host lists its listeners.
//!
//! Turning the supply off always ramps the output to zero first, and gains can only be written
//! while the supply is off.
//!
//! Logging goes through `tracing`; install a subscriber in the application to see it.

pub mod address;
pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod line;
pub mod notify;
mod printf;
pub mod protocol;
pub mod reply;
pub mod session;
pub mod status;

#[cfg(test)]
mod mock_serial;
