use fugit::MicrosDurationU64;
use tracing::{info, warn};

use crate::{
    address::{ARRAY_WAVEFORM, FloatAddress, IntAddress, OCTET_IDENTIFICATION, Operation},
    config::DriverConfig,
    delay::{Delay, StdDelay},
    error::{Error, Result},
    line::{EndOfMessage, Transport},
    notify::NotificationSink,
    protocol::ProtocolEngine,
    session::ExchangeStatistics,
    status::{CommandWord, DeviceState},
};

/// Message carried by [`Error::DeviceBusy`] when a gain write is refused.
pub const GAIN_WHILE_ON: &str = "Can't set controller gain when ON";

/// How long a ramp from `setpoint` amps down to zero takes at `max_ramp_ratio` amps per second.
///
/// `None` when no meaningful pause exists: a non-finite setpoint, a ratio that is not finite and
/// positive, or a pause too long to represent.
pub fn ramp_pause(setpoint: f64, max_ramp_ratio: f64) -> Option<MicrosDurationU64> {
    if !setpoint.is_finite() || !max_ramp_ratio.is_finite() || max_ramp_ratio <= 0.0 {
        return None;
    }
    let micros = (setpoint.abs() / max_ramp_ratio * 1e6).round();
    if micros >= u64::MAX as f64 {
        return None;
    }
    Some(MicrosDurationU64::micros(micros as u64))
}

/// You can create an EasyDriver using any [`Transport`], such as a
/// [`SerialLine`](crate::line::SerialLine) around a serial port or socket.
///
/// Values are reached through logical addresses, see [`crate::address`]. Every status reply is
/// pushed to the listeners known to the [`NotificationSink`] once the host has said it is ready
/// for them with [`Self::set_notifications_ready`].
///
/// All calls block until the supply has answered, including the pauses of the multi-step
/// sequences (ramp-down before power off, gain commit).
pub struct EasyDriver<T: Transport, N: NotificationSink, D: Delay = StdDelay, const L: usize = 80> {
    engine: ProtocolEngine<T, L>,
    sink: N,
    delay: D,
    config: DriverConfig,
    /// Ramp subsequent setpoint changes.
    slew_mode: bool,
    notifications_ready: bool,
}

impl<T: Transport, N: NotificationSink, const L: usize> EasyDriver<T, N, StdDelay, L> {
    /// Create a new driver that sleeps the calling thread for its pauses.
    pub fn new(transport: T, sink: N, config: DriverConfig) -> Self {
        Self::with_delay(transport, sink, StdDelay, config)
    }
}

impl<T: Transport, N: NotificationSink, D: Delay, const L: usize> EasyDriver<T, N, D, L> {
    pub fn with_delay(transport: T, sink: N, delay: D, config: DriverConfig) -> Self {
        Self {
            engine: ProtocolEngine::new(transport, &config),
            sink,
            delay,
            config,
            slew_mode: false,
            notifications_ready: false,
        }
    }

    /// Tell the driver whether the host accepts notifications yet.
    pub fn set_notifications_ready(&mut self, ready: bool) {
        self.notifications_ready = ready;
    }

    pub fn read_int(&mut self, address: u32) -> Result<i32, T::Error> {
        match IntAddress::try_from(address) {
            Ok(IntAddress::SlewModeRead) => Ok(i32::from(self.slew_mode)),
            Ok(IntAddress::ForceReadback) => {
                self.probe()?;
                Ok(0)
            }
            _ => Err(self.invalid_address(address, Operation::Int32Read)),
        }
    }

    pub fn write_int(&mut self, address: u32, value: i32) -> Result<(), T::Error> {
        match IntAddress::try_from(address) {
            Ok(IntAddress::SupplyOn) => self.set_supply(value != 0),
            Ok(IntAddress::Reset) => {
                self.command(CommandWord::new().with_reset(true), 0.0)?;
                Ok(())
            }
            Ok(IntAddress::SlewModeWrite) => {
                self.slew_mode = value != 0;
                Ok(())
            }
            _ => Err(self.invalid_address(address, Operation::Int32Write)),
        }
    }

    pub fn read_float(&mut self, address: u32) -> Result<f64, T::Error> {
        let Ok(target) = FloatAddress::try_from(address) else {
            return Err(self.invalid_address(address, Operation::Float64Read));
        };
        match target {
            FloatAddress::Kp | FloatAddress::Ki | FloatAddress::Kd => {
                self.engine.read_scalar(format_args!("MRG:{}\r", address))
            }
            FloatAddress::BulkVoltage => self.engine.read_scalar(format_args!("MRP\r")),
            FloatAddress::FetTemperature => self.engine.read_scalar(format_args!("MRT\r")),
            FloatAddress::ShuntTemperature => self.engine.read_scalar(format_args!("MRTS\r")),
            FloatAddress::OutputVoltage => self.engine.read_scalar(format_args!("MRV\r")),
            FloatAddress::SetpointCurrent => Ok(self.probe()?.setpoint_current),
            // Only ever delivered through notifications.
            FloatAddress::ReadbackCurrent => {
                Err(self.invalid_address(address, Operation::Float64Read))
            }
        }
    }

    pub fn write_float(&mut self, address: u32, value: f64) -> Result<(), T::Error> {
        let target = FloatAddress::try_from(address).ok();
        if let Some(index) = target.and_then(FloatAddress::gain_index) {
            return self.write_gain(index, value);
        }
        if target == Some(FloatAddress::SetpointCurrent) {
            self.engine.session_mut().statistics_mut().setpoint_updates += 1;
            let command = CommandWord::new()
                .with_on_off(true)
                .with_slew_rate(self.slew_mode);
            self.command(command, value)?;
            return Ok(());
        }
        Err(self.invalid_address(address, Operation::Float64Write))
    }

    /// Read the identification string into `data`.
    ///
    /// Returns how many bytes were copied and whether the whole string fit.
    pub fn read_octet(&mut self, address: u32, data: &mut [u8]) -> Result<(usize, EndOfMessage), T::Error> {
        if address != OCTET_IDENTIFICATION {
            return Err(self.invalid_address(address, Operation::OctetRead));
        }
        let version = self.engine.read_version()?;
        let (copied, eom) = if data.len() <= version.len() {
            (data.len(), EndOfMessage::Count)
        } else {
            (version.len(), EndOfMessage::Terminator)
        };
        data[..copied].copy_from_slice(&version[..copied]);
        Ok((copied, eom))
    }

    /// Load a waveform table into the supply.
    pub fn write_array(&mut self, address: u32, samples: &[f32]) -> Result<(), T::Error> {
        if address != ARRAY_WAVEFORM {
            return Err(self.invalid_address(address, Operation::ArrayWrite));
        }
        self.engine.write_waveform(samples)
    }

    /// Write the diagnostic counters, see [`ExchangeStatistics::report`].
    pub fn report<W: core::fmt::Write>(&mut self, out: &mut W, details: u32) -> core::fmt::Result {
        self.engine.session_mut().statistics_mut().report(out, details)
    }

    /// State from the last successful status exchange, if there has been one.
    pub fn state(&self) -> Option<&DeviceState> {
        self.engine.state()
    }

    pub fn slew_mode(&self) -> bool {
        self.slew_mode
    }

    pub fn statistics(&self) -> &ExchangeStatistics {
        self.engine.session().statistics()
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut N {
        &mut self.sink
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn transport(&self) -> &T {
        self.engine.session().transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.session_mut().transport_mut()
    }

    /// Turn the supply on at zero output, or ramp it to zero and turn it off.
    fn set_supply(&mut self, on: bool) -> Result<(), T::Error> {
        let state = self.probe()?;

        if on {
            if !state.is_on() {
                info!("turning supply on");
                self.command(CommandWord::new().with_on_off(true), 0.0)?;
            }
            return Ok(());
        }

        if state.is_on() {
            // Never drop a live inductive load: ramp to zero first.
            if state.setpoint_current != 0.0 {
                let Some(pause) = ramp_pause(state.setpoint_current, self.config.max_ramp_ratio())
                else {
                    self.engine.session_mut().statistics_mut().rejected += 1;
                    warn!(
                        setpoint = state.setpoint_current,
                        "no safe ramp-down pause, leaving supply on"
                    );
                    return Err(Error::InvalidRamp {
                        setpoint: state.setpoint_current,
                    });
                };
                info!(
                    setpoint = state.setpoint_current,
                    pause_ms = pause.to_millis(),
                    "ramping down before turning off"
                );
                self.command(CommandWord::new().with_on_off(true).with_slew_rate(true), 0.0)?;
                self.delay.delay(pause);
            }
            info!("turning supply off");
            self.command(CommandWord::new(), 0.0)?;
        }
        Ok(())
    }

    /// Write a loop gain, commit it to EEPROM and reload the controller parameters.
    fn write_gain(&mut self, index: u32, value: f64) -> Result<(), T::Error> {
        let state = self.probe()?;
        if state.is_on() {
            self.engine.session_mut().statistics_mut().rejected += 1;
            warn!(index, "refusing gain write while on");
            return Err(Error::DeviceBusy(GAIN_WHILE_ON));
        }

        info!(index, value, "writing controller gain");
        self.engine.write_gain(index, value)?;
        self.delay.delay(self.config.settle_delay.convert());
        self.engine.send_acknowledged(format_args!("MUP\r"))?;
        self.delay.delay(self.config.settle_delay.convert());
        self.engine.send_acknowledged(format_args!("PTP\r"))
    }

    /// Ask for a status reply without changing anything.
    fn probe(&mut self) -> Result<DeviceState, T::Error> {
        self.command(CommandWord::probe(), 0.0)
    }

    fn command(&mut self, command: CommandWord, setpoint: f64) -> Result<DeviceState, T::Error> {
        self.engine
            .set_status_and_read(command, setpoint, self.notifications_ready, &mut self.sink)
    }

    fn invalid_address(&mut self, address: u32, operation: Operation) -> Error<T::Error> {
        self.engine.session_mut().statistics_mut().rejected += 1;
        warn!(address, %operation, "invalid address");
        Error::InvalidAddress { address, operation }
    }
}
