use crate::domain::{
    config::SplitterConfig,
    error::{RawComError, RawComResult},
};
use regex::bytes::Regex;
use std::time::Duration;

/// Largest chunk the inter-byte timeout framer buffers before flushing on its own.
pub const MAX_TIMEOUT_FRAME: usize = 65536;

/// Splits a raw byte stream into discrete message chunks.
pub trait Framer: Send {
    /// Feed bytes; returns every chunk completed by them.
    fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>>;

    /// Silence after which pending bytes should be flushed, if the framer works on timing.
    fn silence_interval(&self) -> Option<Duration> {
        None
    }

    /// Whether bytes are buffered waiting for a frame boundary.
    fn has_pending(&self) -> bool;

    /// Emit whatever is buffered as one chunk.
    fn flush(&mut self) -> Option<Vec<u8>>;
}

/// The single framing policy a session runs with.
#[derive(Debug, Clone)]
pub enum FramingPolicy {
    Delimiter { delimiter: Vec<u8>, include: bool },
    Regex(Regex),
    Timeout(Duration),
}

impl FramingPolicy {
    /// Pick the policy from a splitter selector: delimiter, then regex, then timeout.
    pub fn from_config(config: &SplitterConfig) -> RawComResult<Self> {
        if let Some(delimiter) = &config.delimiter {
            if delimiter.is_empty() {
                return Err(RawComError::config("Splitter delimiter must not be empty"));
            }
            return Ok(FramingPolicy::Delimiter {
                delimiter: delimiter.as_bytes().to_vec(),
                include: config.include_delimiter,
            });
        }
        if let Some(pattern) = &config.regex {
            let regex = Regex::new(pattern).map_err(|e| {
                RawComError::config(format!("Invalid splitter regex '{}': {}", pattern, e))
            })?;
            return Ok(FramingPolicy::Regex(regex));
        }
        if let Some(ms) = config.timeout {
            return Ok(FramingPolicy::Timeout(Duration::from_millis(ms)));
        }
        Err(RawComError::config(
            "No splitter policy configured (delimiter, regex or timeout)",
        ))
    }

    pub fn build(&self) -> Box<dyn Framer> {
        match self {
            FramingPolicy::Delimiter { delimiter, include } => {
                Box::new(DelimiterFramer::new(delimiter.clone(), *include))
            }
            FramingPolicy::Regex(regex) => Box::new(RegexFramer::new(regex.clone())),
            FramingPolicy::Timeout(interval) => Box::new(TimeoutFramer::new(*interval)),
        }
    }
}

/// Splits on a fixed byte sequence.
#[derive(Debug)]
pub struct DelimiterFramer {
    delimiter: Vec<u8>,
    include: bool,
    buffer: Vec<u8>,
}

impl DelimiterFramer {
    pub fn new(delimiter: Vec<u8>, include: bool) -> Self {
        Self {
            delimiter,
            include,
            buffer: Vec::new(),
        }
    }
}

impl Framer for DelimiterFramer {
    fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(position) = find(&self.buffer, &self.delimiter) {
            let end = position + self.delimiter.len();
            let frame_end = if self.include { end } else { position };
            let frame = self.buffer[..frame_end].to_vec();
            self.buffer.drain(..end);
            if !frame.is_empty() {
                frames.push(frame);
            }
        }
        frames
    }

    fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Splits on every match of a pattern, keeping the unterminated tail buffered.
#[derive(Debug)]
pub struct RegexFramer {
    regex: Regex,
    buffer: Vec<u8>,
}

impl RegexFramer {
    pub fn new(regex: Regex) -> Self {
        Self {
            regex,
            buffer: Vec::new(),
        }
    }
}

impl Framer for RegexFramer {
    fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);
        let mut parts: Vec<Vec<u8>> = self.regex.split(&self.buffer).map(<[u8]>::to_vec).collect();
        self.buffer = parts.pop().unwrap_or_default();
        parts.retain(|part| !part.is_empty());
        parts
    }

    fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Emits whatever arrived once the line has been silent for `interval`.
#[derive(Debug)]
pub struct TimeoutFramer {
    interval: Duration,
    buffer: Vec<u8>,
}

impl TimeoutFramer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buffer: Vec::new(),
        }
    }
}

impl Framer for TimeoutFramer {
    fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &byte in data {
            self.buffer.push(byte);
            if self.buffer.len() >= MAX_TIMEOUT_FRAME {
                frames.push(std::mem::take(&mut self.buffer));
            }
        }
        frames
    }

    fn silence_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_priority() {
        let config = SplitterConfig {
            delimiter: Some("\r\n".to_string()),
            include_delimiter: false,
            regex: Some("[\r\n]+".to_string()),
            timeout: Some(100),
        };
        assert!(matches!(
            FramingPolicy::from_config(&config).unwrap(),
            FramingPolicy::Delimiter { .. }
        ));

        let config = SplitterConfig {
            delimiter: None,
            ..config
        };
        assert!(matches!(
            FramingPolicy::from_config(&config).unwrap(),
            FramingPolicy::Regex(_)
        ));

        assert!(matches!(
            FramingPolicy::from_config(&SplitterConfig::default()).unwrap(),
            FramingPolicy::Timeout(d) if d == Duration::from_millis(1100)
        ));
    }

    #[test]
    fn test_missing_policy_is_config_error() {
        let err = FramingPolicy::from_config(&SplitterConfig::none()).unwrap_err();
        assert!(matches!(err, RawComError::Config { .. }));
        assert!(FramingPolicy::from_config(&SplitterConfig::delimiter("")).is_err());
        assert!(FramingPolicy::from_config(&SplitterConfig::regex("(")).is_err());
    }

    #[test]
    fn test_delimiter_across_chunks() {
        let mut framer = DelimiterFramer::new(b"\r\n".to_vec(), false);
        assert!(framer.push(b"OK\r").is_empty());
        assert_eq!(framer.push(b"\nPWR=1\r\n\r\nER"), vec![b"OK".to_vec(), b"PWR=1".to_vec()]);
        assert!(framer.has_pending());
        assert_eq!(framer.flush(), Some(b"ER".to_vec()));
        assert!(!framer.has_pending());
    }

    #[test]
    fn test_delimiter_included() {
        let mut framer = DelimiterFramer::new(b";".to_vec(), true);
        assert_eq!(framer.push(b"a;b;"), vec![b"a;".to_vec(), b"b;".to_vec()]);
    }

    #[test]
    fn test_regex_split() {
        let mut framer = RegexFramer::new(Regex::new(r"[\r\n]+").unwrap());
        assert_eq!(framer.push(b"one\r\ntwo\nthr"), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(framer.push(b"ee\n"), vec![b"three".to_vec()]);
        assert!(!framer.has_pending());
    }

    #[test]
    fn test_timeout_framer_buffers_until_flush() {
        let mut framer = TimeoutFramer::new(Duration::from_millis(50));
        assert!(framer.push(b"abc").is_empty());
        assert!(framer.push(b"def").is_empty());
        assert_eq!(framer.silence_interval(), Some(Duration::from_millis(50)));
        assert_eq!(framer.flush(), Some(b"abcdef".to_vec()));
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_timeout_framer_caps_frame_size() {
        let mut framer = TimeoutFramer::new(Duration::from_millis(50));
        let frames = framer.push(&vec![0u8; MAX_TIMEOUT_FRAME + 10]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MAX_TIMEOUT_FRAME);
        assert_eq!(framer.flush().map(|f| f.len()), Some(10));
    }
}
