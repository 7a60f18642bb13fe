use crate::core::communication::transport::{Transport, TransportEvent, TransportEvents, TransportState};
use crate::domain::{
    config::{Address, TransportMode},
    error::{RawComError, RawComResult},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Bookkeeping shared between the adapter and its reader task
#[derive(Debug)]
struct LinkShared {
    state: Mutex<TransportState>,
    last_activity: Mutex<Instant>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
}

impl LinkShared {
    fn state(&self) -> TransportState {
        self.state.lock().map(|s| *s).unwrap_or(TransportState::Closed)
    }

    fn set_state(&self, state: TransportState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn last_activity(&self) -> Instant {
        self.last_activity.lock().map(|l| *l).unwrap_or_else(|_| Instant::now())
    }

    async fn shutdown_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                warn!("Failed to shutdown TCP stream: {}", e);
            }
        }
    }
}

/// Puts the link back to `Closed` if a connect attempt is dropped before it finished
struct ConnectingGuard {
    shared: Arc<LinkShared>,
    armed: bool,
}

impl ConnectingGuard {
    fn new(shared: &Arc<LinkShared>) -> Self {
        shared.set_state(TransportState::Connecting);
        Self {
            shared: Arc::clone(shared),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared.set_state(TransportState::Closed);
        }
    }
}

/// TCP client adapter. Reconnects on demand after every close.
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    idle_timeout: Option<Duration>,
    shared: Arc<LinkShared>,
    reader: Option<JoinHandle<()>>,
    events: TransportEvents,
}

impl TcpTransport {
    pub fn new(address: &Address, idle_timeout: Option<Duration>, events: TransportEvents) -> Self {
        Self {
            host: address.host.clone().unwrap_or_default(),
            port: address.port,
            connect_timeout: Duration::from_millis(address.connect_timeout_ms),
            idle_timeout,
            shared: Arc::new(LinkShared {
                state: Mutex::new(TransportState::Closed),
                last_activity: Mutex::new(Instant::now()),
                writer: tokio::sync::Mutex::new(None),
            }),
            reader: None,
            events,
        }
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("TCP event dropped, session listener is gone");
        }
    }

    fn report(&self, message: String) {
        self.shared.set_state(TransportState::Closed);
        warn!("{}", message);
        self.emit(TransportEvent::Error(message));
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Tcp
    }

    fn state(&self) -> TransportState {
        self.shared.state()
    }

    async fn connect(&mut self) -> RawComResult<()> {
        if self.state() != TransportState::Closed {
            return Ok(());
        }
        let guard = ConnectingGuard::new(&self.shared);

        // Connect with timeout
        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                let message = format!("Failed to connect to {}:{}: {}", self.host, self.port, e);
                self.report(message.clone());
                return Err(RawComError::Communication { message });
            }
            Err(_) => {
                self.report(format!("Connection timeout to {}:{}", self.host, self.port));
                return Err(RawComError::Timeout);
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        *self.shared.writer.lock().await = Some(write_half);
        self.shared.touch();
        self.shared.set_state(TransportState::Open);
        self.reader = Some(tokio::spawn(read_loop(
            read_half,
            Arc::clone(&self.shared),
            self.idle_timeout,
            self.events.clone(),
        )));
        guard.disarm();

        info!("TCP connection established to {}:{}", self.host, self.port);
        self.emit(TransportEvent::Connected);
        Ok(())
    }

    async fn close(&mut self) -> RawComResult<()> {
        if self.state() != TransportState::Open {
            return Ok(());
        }

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.shared.shutdown_writer().await;

        self.shared.set_state(TransportState::Closed);
        info!("TCP connection to {}:{} closed", self.host, self.port);
        self.emit(TransportEvent::Closed);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> RawComResult<()> {
        if self.state() != TransportState::Open {
            return Err(RawComError::DeviceNotConnected);
        }
        {
            let mut guard = self.shared.writer.lock().await;
            let writer = guard.as_mut().ok_or(RawComError::DeviceNotConnected)?;
            writer.write_all(data).await?;
            writer.flush().await?;
        }
        self.shared.touch();
        debug!("Sent {} bytes over TCP", data.len());
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    shared: Arc<LinkShared>,
    idle_timeout: Option<Duration>,
    events: TransportEvents,
) {
    let mut buffer = vec![0u8; 4096];

    loop {
        let deadline = idle_timeout
            .map(|idle| shared.last_activity() + idle)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            read = reader.read(&mut buffer) => match read {
                Ok(0) => {
                    info!("TCP connection closed by peer");
                    break;
                }
                Ok(n) => {
                    debug!("Received {} bytes over TCP", n);
                    shared.touch();
                    if events.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from TCP stream: {}", e);
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            },
            _ = tokio::time::sleep_until(deadline), if idle_timeout.is_some() => {
                if let Some(idle) = idle_timeout {
                    if shared.last_activity().elapsed() >= idle {
                        info!("TCP link idle for {:?}, closing", idle);
                        break;
                    }
                }
            }
        }
    }

    // The writer goes first so a reconnect never sees a half torn-down link
    shared.shutdown_writer().await;
    shared.set_state(TransportState::Closed);
    let _ = events.send(TransportEvent::Closed);
}
