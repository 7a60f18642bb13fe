use crate::core::communication::{
    codec::{Codec, Encoded},
    framer::{Framer, FramingPolicy},
    message::{ConnectionStatus, DeviceCommand, DeviceEvent},
    transport::{Transport, TransportEvent, TransportEvents, TransportState},
};
use crate::core::session::queue::{CommandQueue, DrainState};
use crate::domain::{
    config::{Address, Options, TransportMode},
    error::RawComResult,
};
use crate::infrastructure::{
    logging::LogSinks, serial::SerialTransport, stream::StreamTransport, tcp::TcpTransport,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 1024;

/// One managed device: its transport, framer, codec, command queue and event stream.
///
/// `Session` is a cheap handle; clones share the same device. Construction and
/// [`Session::process`] spawn tasks and must run inside a tokio runtime.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    name: String,
    address: String,
    mode: TransportMode,
    options: Options,
    codec: Codec,
    transport: tokio::sync::Mutex<Option<Box<dyn Transport>>>,
    queue: CommandQueue,
    events: broadcast::Sender<DeviceEvent>,
    sinks: Arc<LogSinks>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create a session with the transport implied by `address`.
    ///
    /// Without a host, path or stream no transport is created; commands are then encoded
    /// and paced but never written.
    pub fn new(address: Address, options: Options) -> RawComResult<Self> {
        let mode = address.resolved_mode();
        if !address.has_endpoint() {
            warn!(
                "Device '{}' has no host, path or stream; running without a transport",
                address.name
            );
            return Self::build(address, options, None);
        }

        let idle_timeout = options.disconnect.idle_timeout();
        let endpoint = address.clone();
        let factory: Box<dyn FnOnce(TransportEvents) -> Box<dyn Transport> + Send> = match mode {
            TransportMode::Tcp => Box::new(move |events| {
                Box::new(TcpTransport::new(&endpoint, idle_timeout, events)) as Box<dyn Transport>
            }),
            TransportMode::Serial => Box::new(move |events| {
                Box::new(SerialTransport::new(&endpoint, events)) as Box<dyn Transport>
            }),
            TransportMode::Stream => Box::new(move |events| {
                let transport = match &endpoint.stream {
                    Some(handle) => StreamTransport::new(handle, events),
                    None => StreamTransport::detached(),
                };
                Box::new(transport) as Box<dyn Transport>
            }),
        };
        Self::build(address, options, Some(factory))
    }

    /// Create a session around a caller supplied transport.
    ///
    /// `factory` receives the channel the transport must publish its notifications on.
    pub fn with_transport<F>(address: Address, options: Options, factory: F) -> RawComResult<Self>
    where
        F: FnOnce(TransportEvents) -> Box<dyn Transport> + Send + 'static,
    {
        Self::build(address, options, Some(Box::new(factory)))
    }

    fn build(
        address: Address,
        options: Options,
        factory: Option<Box<dyn FnOnce(TransportEvents) -> Box<dyn Transport> + Send>>,
    ) -> RawComResult<Self> {
        let policy = FramingPolicy::from_config(&options.splitter)?;
        let sinks = Arc::new(LogSinks::open(&address.name, &options.logger)?);
        let name = address.name.clone();
        let address_str = address.display_string();
        let codec = Codec::new(name.clone(), &options);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport = factory.map(|factory| factory(transport_tx));

        let pump = Pump {
            name: name.clone(),
            address: address_str.clone(),
            codec: codec.clone(),
            events: events.clone(),
            sinks: Arc::clone(&sinks),
        };
        let pump = tokio::spawn(pump.run(transport_rx, policy.build()));

        info!(
            "Session '{}' created ({} {})",
            name,
            address.resolved_mode(),
            address_str
        );

        Ok(Self {
            inner: Arc::new(SessionInner {
                name,
                address: address_str,
                mode: address.resolved_mode(),
                options,
                codec,
                transport: tokio::sync::Mutex::new(transport),
                queue: CommandQueue::new(),
                events,
                sinks,
                pump: Mutex::new(Some(pump)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Endpoint as shown in notifications
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn mode(&self) -> TransportMode {
        self.inner.mode
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Queue commands for sending. They go out in submission order, one at a time.
    pub fn process<I, S>(&self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.inner.queue.enqueue(commands) {
            debug!("Session '{}' starts draining", self.inner.name);
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }
    }

    /// Open the transport unless it is open or opening. Failures only surface as
    /// `connectionStatus` error events.
    pub async fn connect(&self) {
        self.inner.connect().await;
    }

    /// Close the transport if it is open
    pub async fn close(&self) {
        self.inner.close().await;
    }

    /// Commands still queued, including the one in flight
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.queue.state() == DrainState::Idle
    }

    /// Resolve once the queue is idle
    pub async fn wait_idle(&self) {
        let mut state = self.inner.queue.subscribe();
        let _ = state.wait_for(|s| *s == DrainState::Idle).await;
    }

    /// Link state, or `None` when the session has no transport
    pub async fn transport_state(&self) -> Option<TransportState> {
        self.inner.transport.lock().await.as_ref().map(|t| t.state())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("address", &self.inner.address)
            .field("mode", &self.inner.mode)
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}

impl SessionInner {
    fn publish(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn connect(&self) {
        let mut transport = self.transport.lock().await;
        if let Some(transport) = transport.as_mut() {
            if let Err(e) = transport.connect().await {
                debug!("Connect for '{}' failed: {}", self.name, e);
            }
        }
    }

    async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if let Some(transport) = transport.as_mut() {
            if let Err(e) = transport.close().await {
                warn!("Close for '{}' failed: {}", self.name, e);
            }
        }
    }

    /// Run one queue entry; returns how long the queue must wait before the next.
    async fn dispatch(&self, command: &str) -> Duration {
        match self.codec.encode(command) {
            Encoded::Command(cmd) => {
                if cmd.is_transmittable() {
                    self.transmit(&cmd).await;
                }
                Duration::from_millis(cmd.duration)
            }
            Encoded::Connect => {
                self.connect().await;
                Duration::ZERO
            }
            Encoded::Close => {
                self.close().await;
                Duration::ZERO
            }
            Encoded::Ignored => Duration::ZERO,
        }
    }

    async fn transmit(&self, cmd: &DeviceCommand) {
        let mut guard = self.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            warn!("Session '{}' has no transport, '{}' not sent", self.name, cmd.command);
            return;
        };

        if let Err(e) = transport.connect().await {
            debug!("Skipping '{}' for '{}': {}", cmd.command, self.name, e);
            return;
        }

        match transport.write(&cmd.encoded).await {
            Ok(()) => {
                drop(guard);
                debug!("Sent '{}' to '{}' ({})", cmd.command, self.name, cmd.encoded_as_hex());
                self.sinks.record_outbound(&cmd.encoded);
                self.publish(DeviceEvent::CommandForDevice(cmd.clone()));
            }
            Err(e) => {
                drop(guard);
                warn!("Failed to send '{}' to '{}': {}", cmd.command, self.name, e);
                self.publish(DeviceEvent::ConnectionStatus {
                    name: self.name.clone(),
                    address: self.address.clone(),
                    status: ConnectionStatus::Error,
                    more: Some(e.to_string()),
                });
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.lock() {
            if let Some(pump) = pump.take() {
                pump.abort();
            }
        }
    }
}

/// Drain the queue one entry at a time, each held for its pacing window.
async fn drain(inner: Arc<SessionInner>) {
    loop {
        let Some(command) = inner.queue.front() else {
            if inner.options.disconnect.closes_when_drained() {
                inner.close().await;
            }
            if inner.queue.finish() {
                debug!("Session '{}' queue drained", inner.name);
                return;
            }
            continue;
        };

        let pacing = inner.dispatch(&command).await;
        tokio::time::sleep(pacing).await;
        inner.queue.pop_front();
    }
}

/// Routes transport notifications to subscribers, the framer and the log files.
struct Pump {
    name: String,
    address: String,
    codec: Codec,
    events: broadcast::Sender<DeviceEvent>,
    sinks: Arc<LogSinks>,
}

impl Pump {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<TransportEvent>, mut framer: Box<dyn Framer>) {
        loop {
            let silence = framer
                .silence_interval()
                .filter(|_| framer.has_pending());

            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle(event, framer.as_mut()),
                    None => break,
                },
                _ = tokio::time::sleep(silence.unwrap_or_default()), if silence.is_some() => {
                    if let Some(chunk) = framer.flush() {
                        self.respond(&chunk);
                    }
                }
            }
        }
        debug!("Transport events for '{}' ended", self.name);
    }

    fn handle(&self, event: TransportEvent, framer: &mut dyn Framer) {
        match event {
            TransportEvent::Data(data) => {
                self.sinks.record_inbound(&data);
                let chunks = framer.push(&data);
                self.publish(DeviceEvent::ConnectionData {
                    name: self.name.clone(),
                    address: self.address.clone(),
                    data,
                });
                for chunk in chunks {
                    self.respond(&chunk);
                }
            }
            TransportEvent::Connected => self.status(ConnectionStatus::Connected, None),
            TransportEvent::Opened => self.status(ConnectionStatus::Opened, None),
            TransportEvent::Error(message) => self.status(ConnectionStatus::Error, Some(message)),
            TransportEvent::Closed => self.status(ConnectionStatus::Closed, None),
        }
    }

    fn respond(&self, chunk: &[u8]) {
        self.publish(DeviceEvent::ResponseFromDevice(self.codec.decode(chunk)));
    }

    fn status(&self, status: ConnectionStatus, more: Option<String>) {
        self.publish(DeviceEvent::ConnectionStatus {
            name: self.name.clone(),
            address: self.address.clone(),
            status,
            more,
        });
    }

    fn publish(&self, event: DeviceEvent) {
        let _ = self.events.send(event);
    }
}
