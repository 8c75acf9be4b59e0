use std::env;

use easydriver_psu::{
    address::{FloatAddress, IntAddress, OCTET_IDENTIFICATION},
    config::DriverConfig,
    driver::EasyDriver,
    line::SerialLine,
    notify::RecordingSink,
    status::StatusBit,
};
use inquire::Select;
use serialport::SerialPort;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
// Per read call; the driver applies its own reply timeout on top.
const SERIAL_TIMEOUT_MS: u64 = 100;
const SETPOINT_A: f64 = 1.5;
const STABILIZATION_DELAY_MS: u64 = 1000;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let pending = self
            .0
            .bytes_to_read()
            .map_err(|e| IoError(std::io::Error::from(e)))?;
        Ok(pending > 0)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        // List available serial ports
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        // Interactive selection
        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    // Open serial port
    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let mut sink = RecordingSink::new();
    for bit in StatusBit::iter() {
        sink.subscribe_status(bit.index(), bit.index());
    }
    sink.subscribe_scalar(100, FloatAddress::ReadbackCurrent as u32);

    let mut psu: EasyDriver<_, _> = EasyDriver::new(
        SerialLine::new(PortWrapper(port)),
        sink,
        DriverConfig::from_flags(0x1),
    );
    psu.set_notifications_ready(true);

    let mut version = [0u8; 32];
    let (n, _) = psu.read_octet(OCTET_IDENTIFICATION, &mut version).unwrap();
    println!("Firmware: {}", String::from_utf8_lossy(&version[..n]));

    // Turn on at zero output, then ramp to the setpoint
    psu.write_int(IntAddress::SupplyOn as u32, 1).unwrap();
    psu.write_int(IntAddress::SlewModeWrite as u32, 1).unwrap();
    psu.write_float(FloatAddress::SetpointCurrent as u32, SETPOINT_A).unwrap();
    println!("Setpoint {}A", SETPOINT_A);

    std::thread::sleep(std::time::Duration::from_millis(STABILIZATION_DELAY_MS));

    psu.read_int(IntAddress::ForceReadback as u32).unwrap();
    if let Some(state) = psu.state() {
        println!("Readback: {:.4}A", state.readback_current);
        for bit in StatusBit::iter() {
            println!("{:>24}: {}", bit.to_string(), state.status.is_set(bit));
        }
    }
    println!(
        "Output voltage: {:.3}V",
        psu.read_float(FloatAddress::OutputVoltage as u32).unwrap()
    );
    println!(
        "FET temperature: {:.1}",
        psu.read_float(FloatAddress::FetTemperature as u32).unwrap()
    );

    // Ramps down before switching off
    psu.write_int(IntAddress::SupplyOn as u32, 0).unwrap();
    println!("Output disabled");

    println!("\n--- Notifications ---");
    println!("{:?}", psu.sink().scalar_deliveries);

    let mut report = String::new();
    psu.report(&mut report, 1).unwrap();
    println!("\n--- Statistics ---\n{}", report);
}
