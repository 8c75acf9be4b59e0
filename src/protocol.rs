//! Command builders for the Easy Driver protocol.
//!
//! [`ProtocolEngine`] turns requests into command strings, runs them through a [`Session`] and
//! keeps the [`DeviceState`] reported by the last successful status exchange.

use core::fmt::{self, Write};

use tracing::{debug, warn};

use crate::{
    config::DriverConfig,
    error::{Error, Result},
    line::Transport,
    notify::{NotificationSink, fan_out},
    printf::{General, Scientific},
    reply::{
        MalformedReply, expect_acknowledge, parse_scalar_reply, parse_status_reply,
        parse_version_reply,
    },
    session::Session,
    status::{CommandWord, DeviceState},
};

/// Owns the session with one supply and the state it last reported.
pub struct ProtocolEngine<T: Transport, const L: usize> {
    session: Session<T, L>,
    /// `None` until the first status reply has been parsed.
    state: Option<DeviceState>,
}

impl<T: Transport, const L: usize> ProtocolEngine<T, L> {
    pub fn new(transport: T, config: &DriverConfig) -> Self {
        Self {
            session: Session::new(transport, config),
            state: None,
        }
    }

    /// Send a command that the supply answers with `#AK`.
    pub fn send_acknowledged(&mut self, args: fmt::Arguments<'_>) -> Result<(), T::Error> {
        let command = self.format(args)?;
        let acknowledged = expect_acknowledge(self.session.exchange(command.as_bytes())?);
        self.check_reply(acknowledged)
    }

    /// Send a read request and parse its reply as a single number.
    pub fn read_scalar(&mut self, args: fmt::Arguments<'_>) -> Result<f64, T::Error> {
        let command = self.format(args)?;
        let value = parse_scalar_reply(self.session.exchange(command.as_bytes())?);
        self.check_reply(value)
    }

    /// Send an `FDB` status command and take the state from its reply.
    ///
    /// The status-request bit is always added to `command`. On success the stored state is
    /// replaced as a whole and, if the host is `ready`, fanned out to `sink`. On failure the stored
    /// state is left as it was.
    pub fn set_status_and_read<N: NotificationSink + ?Sized>(
        &mut self,
        command: CommandWord,
        setpoint: f64,
        ready: bool,
        sink: &mut N,
    ) -> Result<DeviceState, T::Error> {
        let word = command.with_status_request(true);
        let command = self.format(format_args!("FDB:{:02X}:{:.4}\r", word.value(), setpoint))?;
        let parsed = parse_status_reply(self.session.exchange(command.as_bytes())?);
        let state = self.check_reply(parsed)?;

        self.state = Some(state);
        debug!(
            status = u32::from(state.status),
            setpoint = state.setpoint_current,
            readback = state.readback_current,
            "status"
        );
        fan_out(&state, ready, sink);
        Ok(state)
    }

    /// Read the identification string, without its `#MVER:` prefix.
    pub fn read_version(&mut self) -> Result<heapless::Vec<u8, L>, T::Error> {
        let payload = parse_version_reply(self.session.exchange(b"MVER\r")?).map(|payload| {
            let mut owned = heapless::Vec::new();
            // The payload is a slice of an L sized reply so it always fits.
            let _ = owned.extend_from_slice(payload);
            owned
        });
        self.check_reply(payload)
    }

    /// Load a waveform table: announce its length, then send each sample.
    ///
    /// Stops at the first sample the supply does not acknowledge.
    pub fn write_waveform(&mut self, samples: &[f32]) -> Result<(), T::Error> {
        self.send_acknowledged(format_args!("MWAVEP:{}\r", samples.len()))?;
        for (index, sample) in samples.iter().enumerate() {
            let sample = General::new(f64::from(*sample));
            self.send_acknowledged(format_args!("MWAVE:{}:{}\r", index, sample))?;
        }
        Ok(())
    }

    /// Write a loop gain to the controller's working set.
    pub fn write_gain(&mut self, index: u32, value: f64) -> Result<(), T::Error> {
        self.send_acknowledged(format_args!("MWG:{}:{}\r", index, Scientific(value)))
    }

    pub fn state(&self) -> Option<&DeviceState> {
        self.state.as_ref()
    }

    pub fn session(&self) -> &Session<T, L> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T, L> {
        &mut self.session
    }

    fn format(&mut self, args: fmt::Arguments<'_>) -> Result<heapless::String<L>, T::Error> {
        let mut command = heapless::String::new();
        if command.write_fmt(args).is_err() {
            self.session.statistics_mut().rejected += 1;
            warn!("formatted command does not fit the send buffer");
            return Err(Error::CommandTooLong);
        }
        Ok(command)
    }

    fn check_reply<R>(&mut self, parsed: core::result::Result<R, MalformedReply>) -> Result<R, T::Error> {
        parsed.map_err(|err| {
            self.session.statistics_mut().bad_replies += 1;
            warn!(reply = err.escaped(), "unexpected reply");
            Error::MalformedReply(err)
        })
    }
}
