//! We use this mocking module in unit tests to emulate the supply's serial port.
//!
//! Replies are scripted in advance: every `\r` terminated command written to the port consumes the
//! next scripted entry, which is either a reply that becomes readable or a silence.

use thiserror::Error;

/// What the emulated supply does in response to one command.
enum Scripted {
    Reply(heapless::Vec<u8, 96>),
    Silence,
}

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Every byte written to the port.
    write_buffer: heapless::Vec<u8, 2048>,
    /// Bytes the port will hand back on read.
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Responses to upcoming commands, in order.
    script: heapless::Deque<Scripted, 64>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("simulated timeout")]
    Timeout,
    /// Simulated buffer overflow
    #[error("simulated buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
    /// Would block - no data available
    #[error("would block")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        for _ in buf.iter().filter(|b| **b == b'\r') {
            self.answer_command()?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let available = &self.read_buffer[self.read_position..];
        let n = core::cmp::min(buf.len(), available.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.read_position += n;
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(self.read_position < self.read_buffer.len())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers and no script.
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            script: heapless::Deque::new(),
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Answer the next command with `reply`. Include the `\r` terminator to make it complete.
    pub fn push_reply(&mut self, reply: &[u8]) -> Result<(), MockSerialError> {
        let reply = heapless::Vec::from_slice(reply).map_err(|_| MockSerialError::BufferOverflow)?;
        self.script
            .push_back(Scripted::Reply(reply))
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Leave the next command unanswered.
    pub fn push_silence(&mut self) -> Result<(), MockSerialError> {
        self.script
            .push_back(Scripted::Silence)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Number of scripted responses not yet consumed.
    pub fn pending_script(&self) -> usize {
        self.script.len()
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Every command written so far, terminator stripped.
    pub fn commands(&self) -> Vec<String> {
        self.write_buffer
            .split(|b| *b == b'\r')
            .filter(|c| !c.is_empty())
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    fn answer_command(&mut self) -> Result<(), MockSerialError> {
        match self.script.pop_front() {
            Some(Scripted::Reply(reply)) => {
                // Drop what has already been consumed before queueing more.
                let unread: heapless::Vec<u8, 256> =
                    heapless::Vec::from_slice(&self.read_buffer[self.read_position..])
                        .map_err(|_| MockSerialError::BufferOverflow)?;
                self.read_buffer = unread;
                self.read_position = 0;
                self.read_buffer
                    .extend_from_slice(&reply)
                    .map_err(|_| MockSerialError::BufferOverflow)
            }
            Some(Scripted::Silence) | None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, ReadReady, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert_eq!(mock.read_position, 0);
        assert_eq!(mock.pending_script(), 0);
        assert!(!mock.should_error_on_write);
        assert!(!mock.should_error_on_read);
    }

    #[test]
    fn test_reply_released_by_command() {
        let mut mock = MockSerial::new();
        mock.push_reply(b"#AK\r").unwrap();
        assert!(!mock.read_ready().unwrap());

        // A partial command does not trigger the reply.
        mock.write(b"MU").unwrap();
        assert!(!mock.read_ready().unwrap());

        mock.write(b"P\r").unwrap();
        assert!(mock.read_ready().unwrap());

        let mut buffer = [0u8; 8];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"#AK\r");
        assert!(!mock.read_ready().unwrap());
    }

    #[test]
    fn test_silence_consumes_script_entry() {
        let mut mock = MockSerial::new();
        mock.push_silence().unwrap();
        mock.push_reply(b"#AK\r").unwrap();

        mock.write(b"MUP\r").unwrap();
        assert!(!mock.read_ready().unwrap());
        assert_eq!(mock.pending_script(), 1);

        mock.write(b"MUP\r").unwrap();
        assert!(mock.read_ready().unwrap());
    }

    #[test]
    fn test_read_when_empty_would_block() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::WouldBlock));
    }

    #[test]
    fn test_commands_split_on_terminator() {
        let mut mock = MockSerial::new();
        mock.write(b"FDB:81:0.0000\rMUP\r").unwrap();
        assert_eq!(mock.commands(), vec!["FDB:81:0.0000", "MUP"]);

        mock.clear_written_data();
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_error_flags() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert_eq!(mock.write(b"test"), Err(MockSerialError::SimulatedError));
        assert_eq!(mock.flush(), Err(MockSerialError::SimulatedError));
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        mock.set_read_error(true);
        assert_eq!(mock.read_ready(), Err(MockSerialError::SimulatedError));
        let mut buffer = [0u8; 4];
        assert_eq!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(MockSerialError::Timeout.kind(), embedded_io::ErrorKind::TimedOut));
        assert!(matches!(MockSerialError::BufferOverflow.kind(), embedded_io::ErrorKind::OutOfMemory));
        assert!(matches!(MockSerialError::SimulatedError.kind(), embedded_io::ErrorKind::Other));
    }
}
