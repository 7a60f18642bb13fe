use std::time::Duration;
use rawcom::{
    Address, ConnectionStatus, DeviceEvent, DisconnectPolicy, Encoding, Options, RawComConfig, RawComError, Session,
    SessionManager, SplitterConfig,
};
use rawcom::core::communication::TransportState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Integration tests for the RawCom library
#[cfg(test)]
mod integration_tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn wait_for<F>(events: &mut broadcast::Receiver<DeviceEvent>, mut matches: F) -> DeviceEvent
    where
        F: FnMut(&DeviceEvent) -> bool,
    {
        timeout(WAIT, async {
            loop {
                let event = events.recv().await.expect("session events ended");
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[test]
    fn test_config_serialization() {
        let config = RawComConfig::default();
        let toml_str = toml::to_string(&config).expect("Failed to serialize config");
        let deserialized: RawComConfig = toml::from_str(&toml_str).expect("Failed to deserialize config");

        assert_eq!(config.global.listen_ms, deserialized.global.listen_ms);
        assert_eq!(config.global.log_level, deserialized.global.log_level);
    }

    #[test]
    fn test_error_display() {
        let error = RawComError::Config {
            message: "Invalid configuration".to_string(),
        };
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("Invalid configuration"));
    }

    #[tokio::test]
    async fn test_stream_session_round_trip() {
        let (local, mut device) = tokio::io::duplex(1024);
        let options = Options {
            splitter: SplitterConfig::delimiter("\r"),
            duration: 10,
            ..Options::default()
        };
        let session = Session::new(Address::stream(local).with_name("bench"), options).unwrap();
        let mut events = session.subscribe();

        session.process(["PING\r"]);

        let mut request = [0u8; 5];
        timeout(WAIT, device.read_exact(&mut request)).await.unwrap().unwrap();
        assert_eq!(&request, b"PING\r");

        device.write_all(b"PONG\r").await.unwrap();

        let event = wait_for(&mut events, |e| matches!(e, DeviceEvent::ResponseFromDevice(_))).await;
        let DeviceEvent::ResponseFromDevice(response) = event else {
            unreachable!()
        };
        assert_eq!(response.name, "bench");
        assert_eq!(response.value.as_deref(), Some("PONG"));

        // The device hanging up is reported as a closed link
        drop(device);
        wait_for(&mut events, |e| {
            matches!(e, DeviceEvent::ConnectionStatus { status: ConnectionStatus::Closed, .. })
        })
        .await;
    }

    #[tokio::test]
    async fn test_tcp_session_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 5];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(b"OK 1\n").await.unwrap();
            // Hold the socket until the session hangs up
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
            request
        });

        let options = Options {
            splitter: SplitterConfig::delimiter("\n"),
            duration: 200,
            ..Options::default()
        };
        let session = Session::new(Address::tcp("127.0.0.1", port).with_name("amp"), options).unwrap();
        let mut events = session.subscribe();

        session.process(["VOL?\n"]);

        match wait_for(&mut events, |e| matches!(e, DeviceEvent::ConnectionStatus { .. })).await {
            DeviceEvent::ConnectionStatus { status, address, .. } => {
                assert_eq!(status, ConnectionStatus::Connected);
                assert_eq!(address, format!("127.0.0.1:{}", port));
            }
            _ => unreachable!(),
        }

        let command = wait_for(&mut events, |e| matches!(e, DeviceEvent::CommandForDevice(_))).await;
        assert!(matches!(command, DeviceEvent::CommandForDevice(c) if c.encoded == b"VOL?\n".to_vec()));

        let response = wait_for(&mut events, |e| matches!(e, DeviceEvent::ResponseFromDevice(_))).await;
        assert!(matches!(response, DeviceEvent::ResponseFromDevice(r) if r.value.as_deref() == Some("OK 1")));

        // Queue drained: the session closes the socket on its own
        timeout(WAIT, session.wait_idle()).await.unwrap();
        wait_for(&mut events, |e| {
            matches!(e, DeviceEvent::ConnectionStatus { status: ConnectionStatus::Closed, .. })
        })
        .await;

        let request = timeout(WAIT, device).await.unwrap().unwrap();
        assert_eq!(&request, b"VOL?\n");
    }

    #[tokio::test]
    async fn test_tcp_connection_refused_reports_error() {
        // Grab a free port, then close it again
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let options = Options {
            duration: 10,
            ..Options::default()
        };
        let session = Session::new(Address::tcp("127.0.0.1", port), options).unwrap();
        let mut events = session.subscribe();

        session.process(["PWR?"]);

        let event = wait_for(&mut events, |e| matches!(e, DeviceEvent::ConnectionStatus { .. })).await;
        assert!(matches!(
            event,
            DeviceEvent::ConnectionStatus { status: ConnectionStatus::Error, more: Some(_), .. }
        ));
        timeout(WAIT, session.wait_idle()).await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_connect_does_not_wedge_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let options = Options {
            disconnect: DisconnectPolicy::Flag(false),
            duration: 10,
            encoding: Some(Encoding::Utf8),
            ..Options::default()
        };
        let session = Session::new(Address::tcp("127.0.0.1", port), options).unwrap();

        tokio::select! {
            biased;
            _ = session.connect() => {}
            _ = std::future::ready(()) => {}
        }

        timeout(WAIT, session.connect()).await.unwrap();
        assert_eq!(session.transport_state().await, Some(TransportState::Open));

        let mut events = session.subscribe();
        session.process(["hello"]);
        wait_for(&mut events, |e| matches!(e, DeviceEvent::CommandForDevice(_))).await;
        assert_eq!(session.transport_state().await, Some(TransportState::Open));
    }

    #[tokio::test]
    async fn test_tcp_idle_timeout_closes_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let options = Options {
            disconnect: DisconnectPolicy::IdleTimeout(200),
            duration: 10,
            encoding: Some(Encoding::Utf8),
            ..Options::default()
        };
        let session = Session::new(Address::tcp("127.0.0.1", port), options).unwrap();
        let mut events = session.subscribe();

        session.process(["hello"]);
        timeout(WAIT, session.wait_idle()).await.unwrap();

        // Drained but still open; the idle timer closes it
        wait_for(&mut events, |e| {
            matches!(e, DeviceEvent::ConnectionStatus { status: ConnectionStatus::Closed, .. })
        })
        .await;
    }

    #[tokio::test]
    async fn test_manager_routes_by_name() {
        let manager = SessionManager::new(4);
        let (local, _device) = tokio::io::duplex(64);

        manager
            .create_session(Address::stream(local).with_name("left"), Options::default())
            .await
            .unwrap();
        manager
            .create_session(Address::default().with_name("right"), Options::default())
            .await
            .unwrap();

        let left = manager.get_session("left").await.unwrap();
        assert_eq!(left.address(), "stream");
        assert_eq!(manager.list_sessions().await.len(), 2);

        manager.close_all_sessions().await;
        assert!(manager.get_session("left").await.is_none());
    }
}
