use crate::domain::{config::TransportMode, error::RawComResult};
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// Link state as seen by a transport adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Closed,
    Connecting,
    Open,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Closed => write!(f, "closed"),
            TransportState::Connecting => write!(f, "connecting"),
            TransportState::Open => write!(f, "open"),
        }
    }
}

/// Notification raised by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes from the device
    Data(Vec<u8>),
    /// A tcp connection was established
    Connected,
    /// A serial port was opened
    Opened,
    /// The link failed; the message describes why
    Error(String),
    Closed,
}

/// Channel adapters publish their notifications on.
pub type TransportEvents = mpsc::UnboundedSender<TransportEvent>;

/// Unified transport trait for TCP, serial and stream links.
///
/// `connect` and `close` are idempotent. Failures are reported both through the
/// returned error and as [`TransportEvent::Error`] on the adapter's event channel.
#[async_trait]
pub trait Transport: Send {
    /// Get the transport mode
    fn mode(&self) -> TransportMode;

    /// Current link state
    fn state(&self) -> TransportState;

    /// Open the link unless it is already open or opening
    async fn connect(&mut self) -> RawComResult<()>;

    /// Close the link if it is open
    async fn close(&mut self) -> RawComResult<()>;

    /// Write all of `data`; resolves once the bytes were handed to the link
    async fn write(&mut self, data: &[u8]) -> RawComResult<()>;

    fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }
}
