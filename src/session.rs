//! One logical connection to a supply: command/reply exchange with bounded retry and the
//! counters describing how exchanges went.

use core::fmt::Write;
use std::time::Instant;

use fugit::MillisDurationU32;
use tracing::{error, trace, warn};

use crate::{
    config::DriverConfig,
    error::{Error, Result},
    line::{EndOfMessage, Transport},
    printf::General,
    reply::{ESCAPED_REPLY_LEN, escape},
};

/// Weight kept from the previous average when folding in a new latency sample.
const AVERAGE_SMOOTHING: f64 = 0.998;

/// Running latency of successful exchanges, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExchangeTiming {
    pub max: f64,
    pub avg: f64,
    /// Exchanges folded in since the last clear.
    pub samples: u64,
}

impl ExchangeTiming {
    pub fn record(&mut self, seconds: f64) {
        self.samples += 1;
        if seconds > self.max {
            self.max = seconds;
        }
        self.avg = if self.avg == 0.0 {
            seconds
        } else {
            self.avg * AVERAGE_SMOOTHING + seconds * (1.0 - AVERAGE_SMOOTHING)
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Diagnostic counters. They only ever grow, apart from the timing figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeStatistics {
    /// Calls to [`Session::exchange`], whatever their outcome.
    pub commands: u64,
    pub setpoint_updates: u64,
    pub retries: u64,
    pub no_replies: u64,
    pub bad_replies: u64,
    /// Requests refused before or instead of talking to the device.
    pub rejected: u64,
    /// Present only when timing instrumentation is enabled.
    pub timing: Option<ExchangeTiming>,
}

impl ExchangeStatistics {
    /// Write the counters as text.
    ///
    /// Nothing is written below `details` 1. From `details` 2 the timing figures are cleared once
    /// they have been written.
    pub fn report<W: Write>(&mut self, out: &mut W, details: u32) -> core::fmt::Result {
        if details < 1 {
            return Ok(());
        }
        if let Some(timing) = self.timing.as_mut() {
            writeln!(
                out,
                "Transaction time avg:{} max:{}",
                General::with_significant(timing.avg, 3),
                General::with_significant(timing.max, 3)
            )?;
            if details >= 2 {
                timing.clear();
            }
        }
        writeln!(out, "         Command count: {}", self.commands)?;
        writeln!(out, " Setpoint update count: {}", self.setpoint_updates)?;
        writeln!(out, "           Retry count: {}", self.retries)?;
        writeln!(out, "        No reply count: {}", self.no_replies)?;
        writeln!(out, "       Bad reply count: {}", self.bad_replies)?;
        writeln!(out, "        Rejected count: {}", self.rejected)
    }
}

/// Owns the transport and the reply buffer of one supply.
pub struct Session<T: Transport, const L: usize> {
    transport: T,
    reply: heapless::Vec<u8, L>,
    reply_timeout: MillisDurationU32,
    max_retries: u32,
    statistics: ExchangeStatistics,
}

impl<T: Transport, const L: usize> Session<T, L> {
    pub fn new(transport: T, config: &DriverConfig) -> Self {
        Self {
            transport,
            reply: heapless::Vec::new(),
            reply_timeout: config.reply_timeout,
            max_retries: config.max_retries,
            statistics: ExchangeStatistics {
                timing: config.timing.then(ExchangeTiming::default),
                ..Default::default()
            },
        }
    }

    /// Send `command` and return the reply, terminator stripped.
    ///
    /// Failed attempts are retried up to the configured bound. When every attempt fails the last
    /// transport error is returned inside [`Error::NoReply`].
    pub fn exchange(&mut self, command: &[u8]) -> Result<&[u8], T::Error> {
        self.statistics.commands += 1;
        let mut retries = 0;
        loop {
            let started = self.statistics.timing.is_some().then(Instant::now);
            match self
                .transport
                .write_read(command, &mut self.reply, self.reply_timeout)
            {
                Ok(eom) => {
                    if let (Some(timing), Some(started)) = (self.statistics.timing.as_mut(), started) {
                        timing.record(started.elapsed().as_secs_f64());
                    }
                    if eom == EndOfMessage::Count {
                        warn!(len = self.reply.len(), "reply filled the buffer without a terminator");
                    }
                    trace!(
                        command = %escape::<ESCAPED_REPLY_LEN>(command),
                        reply = %escape::<ESCAPED_REPLY_LEN>(&self.reply),
                        retries,
                        "exchange"
                    );
                    return Ok(&self.reply);
                }
                Err(err) => {
                    if retries >= self.max_retries {
                        self.statistics.no_replies += 1;
                        error!(
                            command = %escape::<ESCAPED_REPLY_LEN>(command),
                            error = ?err,
                            "no reply"
                        );
                        return Err(Error::NoReply {
                            attempts: retries + 1,
                            last: err,
                        });
                    }
                    retries += 1;
                    self.statistics.retries += 1;
                    warn!(retry = retries, error = ?err, "exchange failed, retrying");
                }
            }
        }
    }

    pub fn statistics(&self) -> &ExchangeStatistics {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut ExchangeStatistics {
        &mut self.statistics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
