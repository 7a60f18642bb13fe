// Stream module - Adapter over a caller supplied byte stream
use crate::core::communication::transport::{Transport, TransportEvent, TransportEvents, TransportState};
use crate::domain::{
    config::{DeviceStream, StreamHandle, TransportMode},
    error::{RawComError, RawComResult},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Adapter for a stream that is already live when the session starts.
///
/// There is nothing to open or close, so `connect` and `close` do nothing. The link
/// reports closed once the stream hits end of file.
pub struct StreamTransport {
    state: Arc<Mutex<TransportState>>,
    writer: Option<WriteHalf<Box<dyn DeviceStream>>>,
    reader: Option<JoinHandle<()>>,
}

impl StreamTransport {
    pub fn new(handle: &StreamHandle, events: TransportEvents) -> Self {
        let Some(stream) = handle.take() else {
            warn!("Stream handle was already claimed by another session");
            return Self::detached();
        };

        let (read_half, write_half) = tokio::io::split(stream);
        let state = Arc::new(Mutex::new(TransportState::Open));
        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&state), events));

        Self {
            state,
            writer: Some(write_half),
            reader: Some(reader),
        }
    }

    /// An adapter with no stream behind it; every write fails.
    pub fn detached() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState::Closed)),
            writer: None,
            reader: None,
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Stream
    }

    fn state(&self) -> TransportState {
        self.state.lock().map(|s| *s).unwrap_or(TransportState::Closed)
    }

    async fn connect(&mut self) -> RawComResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> RawComResult<()> {
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> RawComResult<()> {
        let writer = self.writer.as_mut().ok_or(RawComError::DeviceNotConnected)?;
        writer.write_all(data).await?;
        writer.flush().await?;
        debug!("Sent {} bytes over stream", data.len());
        Ok(())
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop(
    mut reader: ReadHalf<Box<dyn DeviceStream>>,
    state: Arc<Mutex<TransportState>>,
    events: TransportEvents,
) {
    let mut buffer = vec![0u8; 4096];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Device stream reached end of file");
                break;
            }
            Ok(n) => {
                if events.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) => {
                error!("Failed to read from device stream: {}", e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        }
    }
    if let Ok(mut current) = state.lock() {
        *current = TransportState::Closed;
    }
    let _ = events.send(TransportEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_stream_passthrough() {
        let (local, mut remote) = tokio::io::duplex(256);
        let handle = StreamHandle::new(local);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = StreamTransport::new(&handle, tx);

        assert!(transport.is_open());
        transport.connect().await.unwrap();

        transport.write(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        remote.write_all(b"OK").await.unwrap();
        assert_eq!(rx.recv().await, Some(TransportEvent::Data(b"OK".to_vec())));

        drop(remote);
        assert_eq!(rx.recv().await, Some(TransportEvent::Closed));
        assert_eq!(transport.state(), TransportState::Closed);
    }

    #[tokio::test]
    async fn test_claimed_handle() {
        let (local, _remote) = tokio::io::duplex(16);
        let handle = StreamHandle::new(local);
        let (tx, _rx) = mpsc::unbounded_channel();
        let _first = StreamTransport::new(&handle, tx.clone());
        let mut second = StreamTransport::new(&handle, tx);

        assert_eq!(second.state(), TransportState::Closed);
        assert!(matches!(second.write(b"x").await, Err(RawComError::DeviceNotConnected)));
    }
}
