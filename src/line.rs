//! The character-stream transport the driver talks through.
//!
//! [`Transport`] is the only thing the rest of the crate needs from the I/O layer: write a command
//! and read back one `\r` terminated reply within a timeout. [`SerialLine`] provides it for any
//! port implementing [`embedded_io::Read`], [`embedded_io::Write`] & [`embedded_io::ReadReady`].

use std::time::{Duration, Instant};

use fugit::MillisDurationU32;
use thiserror::Error;
use tracing::warn;

/// Reply terminator.
pub const TERMINATOR: u8 = b'\r';

const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Why reading a reply stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfMessage {
    /// The terminator was seen. It is not part of the reply.
    Terminator,
    /// The reply buffer filled up before a terminator arrived.
    Count,
}

/// Blocking write-then-read-until-terminator channel.
pub trait Transport {
    type Error: embedded_io::Error;

    /// Send `command` and read one reply into `reply`, without its terminator.
    ///
    /// Gives up with an error once `timeout` passes without a complete reply.
    fn write_read<const L: usize>(
        &mut self,
        command: &[u8],
        reply: &mut heapless::Vec<u8, L>,
        timeout: MillisDurationU32,
    ) -> Result<EndOfMessage, Self::Error>;
}

/// Errors raised by [`SerialLine`].
#[derive(Error, Debug)]
pub enum LineError<E: embedded_io::Error> {
    #[error("Serial communication error: {0:?}")]
    Io(E),
    #[error("Timed out waiting for reply")]
    Timeout,
    #[error("Port closed")]
    Closed,
}

impl<E: embedded_io::Error> embedded_io::Error for LineError<E> {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            LineError::Io(e) => e.kind(),
            LineError::Timeout => embedded_io::ErrorKind::TimedOut,
            LineError::Closed => embedded_io::ErrorKind::NotConnected,
        }
    }
}

/// [`Transport`] over a byte-oriented serial or socket port.
pub struct SerialLine<S> {
    port: S,
}

impl<S> SerialLine<S>
where
    S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
{
    pub fn new(port: S) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    /// Throw away anything left over from an earlier, abandoned exchange.
    fn discard_pending(&mut self) -> Result<(), LineError<S::Error>> {
        let mut scratch = [0u8; 16];
        let mut discarded = 0usize;
        while self.port.read_ready().map_err(LineError::Io)? {
            let n = self.port.read(&mut scratch).map_err(LineError::Io)?;
            if n == 0 {
                break;
            }
            discarded += n;
        }
        if discarded > 0 {
            warn!(bytes = discarded, "discarded stale input");
        }
        Ok(())
    }
}

impl<S> Transport for SerialLine<S>
where
    S: embedded_io::Read + embedded_io::Write + embedded_io::ReadReady,
{
    type Error = LineError<S::Error>;

    fn write_read<const L: usize>(
        &mut self,
        command: &[u8],
        reply: &mut heapless::Vec<u8, L>,
        timeout: MillisDurationU32,
    ) -> Result<EndOfMessage, Self::Error> {
        self.discard_pending()?;

        self.port.write_all(command).map_err(LineError::Io)?;
        self.port.flush().map_err(LineError::Io)?;

        reply.clear();
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout.to_millis()));
        // One byte at a time so nothing past the terminator is consumed.
        let mut byte = [0u8; 1];
        loop {
            if reply.is_full() {
                return Ok(EndOfMessage::Count);
            }
            if !self.port.read_ready().map_err(LineError::Io)? {
                if Instant::now() >= deadline {
                    return Err(LineError::Timeout);
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }
            if self.port.read(&mut byte).map_err(LineError::Io)? == 0 {
                return Err(LineError::Closed);
            }
            if byte[0] == TERMINATOR {
                return Ok(EndOfMessage::Terminator);
            }
            // Cannot fail, fullness was checked above.
            let _ = reply.push(byte[0]);
        }
    }
}
