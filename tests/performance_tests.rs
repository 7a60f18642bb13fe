use std::time::{Duration, Instant};
use rawcom::core::communication::{Framer, FramingPolicy};
use rawcom::{Address, DeviceEvent, Options, RawComConfig, SessionManager, SplitterConfig};

/// Performance and stress tests
#[cfg(test)]
mod performance_tests {
    use super::*;

    #[test]
    fn test_delimiter_framing_throughput() {
        let policy = FramingPolicy::from_config(&SplitterConfig::delimiter("\r\n")).unwrap();
        let mut framer = policy.build();

        let payload: Vec<u8> = (0..10_000).flat_map(|i| format!("LINE {}\r\n", i).into_bytes()).collect();

        let start = Instant::now();
        let mut frames = 0;
        for chunk in payload.chunks(61) {
            frames += framer.push(chunk).len();
        }
        let elapsed = start.elapsed();

        assert_eq!(frames, 10_000);
        assert!(!framer.has_pending());
        assert!(elapsed < Duration::from_secs(2), "Framing too slow: {:?}", elapsed);
    }

    #[test]
    fn test_config_serialization_performance() {
        let config = RawComConfig::default();

        let start = Instant::now();
        for _ in 0..1000 {
            let serialized = toml::to_string(&config).expect("Serialization failed");
            let _: RawComConfig = toml::from_str(&serialized).expect("Deserialization failed");
        }
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_secs(2), "Config serialization too slow: {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_sessions_drain_concurrently() {
        let manager = SessionManager::new(32);
        let options = Options {
            duration: 100,
            ..Options::default()
        };

        let mut sessions = Vec::new();
        for i in 0..20 {
            let session = manager
                .create_session(Address::default().with_name(format!("device_{}", i)), options.clone())
                .await
                .unwrap();
            session.process((0..50).map(|n| format!("CMD {}", n)));
            sessions.push(session);
        }

        let started = tokio::time::Instant::now();
        for session in &sessions {
            session.wait_idle().await;
        }

        // Queues of different sessions pace independently
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(6000), "Sessions paced serially: {:?}", elapsed);
        assert!(manager.list_sessions().await.iter().all(|s| s.idle));
    }

    #[tokio::test]
    async fn test_event_fan_out_to_many_subscribers() {
        let (local, mut device) = tokio::io::duplex(4096);
        let options = Options {
            splitter: SplitterConfig::delimiter("\n"),
            ..Options::default()
        };
        let manager = SessionManager::default();
        let session = manager.create_session(Address::stream(local), options).await.unwrap();
        let mut receivers: Vec<_> = (0..16).map(|_| session.subscribe()).collect();

        use tokio::io::AsyncWriteExt;
        device.write_all(b"A\nB\nC\n").await.unwrap();

        for receiver in &mut receivers {
            let mut values = Vec::new();
            while values.len() < 3 {
                if let DeviceEvent::ResponseFromDevice(response) = receiver.recv().await.unwrap() {
                    values.push(response.value.unwrap());
                }
            }
            assert_eq!(values, vec!["A", "B", "C"]);
        }
    }
}
