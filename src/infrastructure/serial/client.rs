use crate::core::communication::transport::{Transport, TransportEvent, TransportEvents, TransportState};
use crate::domain::{
    config::{Address, ParityConfig, TransportMode},
    error::{RawComError, RawComResult},
};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Poll interval of the blocking reader; bounds how long a close waits for it.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial line settings taken from an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: ParityConfig,
    pub stop_bits: u8,
}

impl SerialSettings {
    pub fn from_address(address: &Address) -> Self {
        Self {
            path: address.path.clone().unwrap_or_default(),
            baud_rate: address.baud_rate,
            data_bits: address.data_bits,
            parity: address.parity,
            stop_bits: address.stop_bits,
        }
    }

    fn builder(&self) -> RawComResult<serialport::SerialPortBuilder> {
        let mut builder = serialport::new(&self.path, self.baud_rate);

        builder = builder.data_bits(match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(RawComError::Communication {
                    message: format!("Invalid data bits: {}", other),
                })
            }
        });

        builder = builder.stop_bits(match self.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(RawComError::Communication {
                    message: format!("Invalid stop bits: {}", other),
                })
            }
        });

        builder = builder.parity(match self.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        });

        Ok(builder.timeout(READ_TIMEOUT))
    }
}

/// Serial ports known to the operating system
pub fn available_ports() -> RawComResult<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Serial port adapter. The port is opened lazily on `connect`.
pub struct SerialTransport {
    settings: SerialSettings,
    state: Arc<Mutex<TransportState>>,
    port: Option<SharedPort>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    events: TransportEvents,
}

impl SerialTransport {
    pub fn new(address: &Address, events: TransportEvents) -> Self {
        Self {
            settings: SerialSettings::from_address(address),
            state: Arc::new(Mutex::new(TransportState::Closed)),
            port: None,
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
            events,
        }
    }

    fn set_state(&self, state: TransportState) {
        set_state(&self.state, state);
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("Serial event dropped, session listener is gone");
        }
    }

    fn fail(&self, message: String) -> RawComError {
        self.report(message.clone());
        RawComError::Communication { message }
    }

    fn report(&self, message: String) {
        self.set_state(TransportState::Closed);
        warn!("{}", message);
        self.emit(TransportEvent::Error(message));
    }
}

fn set_state(state: &Mutex<TransportState>, value: TransportState) {
    if let Ok(mut current) = state.lock() {
        *current = value;
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Serial
    }

    fn state(&self) -> TransportState {
        self.state.lock().map(|s| *s).unwrap_or(TransportState::Closed)
    }

    async fn connect(&mut self) -> RawComResult<()> {
        if self.state() != TransportState::Closed {
            return Ok(());
        }
        self.set_state(TransportState::Connecting);

        let builder = match self.settings.builder() {
            Ok(builder) => builder,
            Err(e) => return Err(self.fail(e.to_string())),
        };
        let port = match builder.open() {
            Ok(port) => port,
            Err(e) => {
                self.report(format!("Failed to open serial port {}: {}", self.settings.path, e));
                return Err(RawComError::Serial(e));
            }
        };
        let reader = match port.try_clone() {
            Ok(reader) => reader,
            Err(e) => return Err(self.fail(format!("Failed to clone serial port handle: {}", e))),
        };

        info!("Serial port {} opened", self.settings.path);

        // Each open gets its own stop flag so a lingering reader cannot see a reset one
        self.stop = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&self.stop);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        self.reader = Some(tokio::task::spawn_blocking(move || read_loop(reader, stop, state, events)));

        self.port = Some(Arc::new(Mutex::new(port)));
        self.set_state(TransportState::Open);
        self.emit(TransportEvent::Opened);
        Ok(())
    }

    async fn close(&mut self) -> RawComResult<()> {
        if self.state() != TransportState::Open {
            return Ok(());
        }
        self.stop.store(true, Ordering::SeqCst);
        self.port = None;
        // The reader holds a cloned handle; the device is only free once it is gone
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("Serial reader task failed: {}", e);
            }
        }
        self.set_state(TransportState::Closed);
        info!("Serial port {} closed", self.settings.path);
        self.emit(TransportEvent::Closed);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> RawComResult<()> {
        if self.state() != TransportState::Open {
            return Err(RawComError::DeviceNotConnected);
        }
        let port = self.port.clone().ok_or(RawComError::DeviceNotConnected)?;
        let data = data.to_vec();
        let len = data.len();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut port = port
                .lock()
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "serial port lock poisoned"))?;
            port.write_all(&data)?;
            port.flush()
        })
        .await
        .map_err(|e| RawComError::Communication {
            message: format!("Serial write task failed: {}", e),
        })??;

        debug!("Sent {} bytes over serial", len);
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn read_loop(
    mut port: Box<dyn SerialPort>,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<TransportState>>,
    events: TransportEvents,
) {
    let mut buffer = vec![0u8; 1024];

    while !stop.load(Ordering::SeqCst) {
        match port.read(&mut buffer) {
            Ok(0) => continue,
            Ok(n) => {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                debug!("Received {} bytes over serial", n);
                if events.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                error!("Failed to read from serial port: {}", e);
                if !stop.load(Ordering::SeqCst) {
                    set_state(&state, TransportState::Closed);
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    let _ = events.send(TransportEvent::Closed);
                }
                return;
            }
        }
    }
}
