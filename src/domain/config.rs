use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::encoding::{self, Encoding};

/// RawCom configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawComConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Device profiles
    #[serde(default)]
    pub devices: Vec<DeviceProfile>,
}

impl RawComConfig {
    /// Profile whose address carries `name`. Later entries win, so project profiles
    /// shadow global ones.
    pub fn find_device(&self, name: &str) -> Option<&DeviceProfile> {
        self.devices.iter().rev().find(|d| d.address.name == name)
    }
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long the CLI keeps listening for responses once the queue drained
    #[serde(default = "default_listen_ms")]
    pub listen_ms: u64,
}

/// A named device: where it lives and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Device description
    #[serde(default)]
    pub description: String,
    pub address: Address,
    #[serde(default)]
    pub options: Options,
}

/// Transport selected for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Tcp,
    Serial,
    Stream,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Tcp => write!(f, "tcp"),
            TransportMode::Serial => write!(f, "serial"),
            TransportMode::Stream => write!(f, "stream"),
        }
    }
}

/// Parity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

impl fmt::Display for ParityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParityConfig::None => write!(f, "none"),
            ParityConfig::Odd => write!(f, "odd"),
            ParityConfig::Even => write!(f, "even"),
        }
    }
}

/// Byte stream a stream-mode session reads from and writes to.
pub trait DeviceStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DeviceStream for T {}

/// Shareable slot holding a caller supplied stream until a session claims it.
#[derive(Clone)]
pub struct StreamHandle(Arc<Mutex<Option<Box<dyn DeviceStream>>>>);

impl StreamHandle {
    pub fn new<S: DeviceStream + 'static>(stream: S) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(stream)))))
    }

    /// Take the stream out of the handle. Only the first caller gets it.
    pub fn take(&self) -> Option<Box<dyn DeviceStream>> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Transport descriptor for one device.
///
/// The effective mode is derived from which endpoint field is present: `host` selects
/// tcp, `path` selects serial and `stream` selects stream mode, in that order. With none
/// of them set the configured `mode` is reported but no transport exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    #[serde(default = "default_device_name")]
    pub name: String,
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_tcp_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(skip)]
    pub stream: Option<StreamHandle>,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            mode: TransportMode::default(),
            host: None,
            port: default_tcp_port(),
            connect_timeout_ms: default_connect_timeout(),
            path: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: ParityConfig::default(),
            stop_bits: default_stop_bits(),
            stream: None,
        }
    }
}

impl Address {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port,
            ..Self::default()
        }
    }

    pub fn serial(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn stream<S: DeviceStream + 'static>(stream: S) -> Self {
        Self {
            stream: Some(StreamHandle::new(stream)),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Mode implied by the endpoint fields, falling back to `mode`.
    pub fn resolved_mode(&self) -> TransportMode {
        if self.host.is_some() {
            TransportMode::Tcp
        } else if self.path.is_some() {
            TransportMode::Serial
        } else if self.stream.is_some() {
            TransportMode::Stream
        } else {
            self.mode
        }
    }

    /// Whether any endpoint field is present.
    pub fn has_endpoint(&self) -> bool {
        self.host.is_some() || self.path.is_some() || self.stream.is_some()
    }

    /// Human readable endpoint used in notifications.
    pub fn display_string(&self) -> String {
        match self.resolved_mode() {
            TransportMode::Tcp => format!("{}:{}", self.host.as_deref().unwrap_or(""), self.port),
            TransportMode::Serial => format!(
                "{}:{},{},{},{}",
                self.path.as_deref().unwrap_or(""),
                self.baud_rate,
                self.data_bits,
                self.parity,
                self.stop_bits
            ),
            TransportMode::Stream => "stream".to_string(),
        }
    }
}

/// When a session lets go of its transport.
///
/// `true`/`false` close (or keep) the link once the command queue drains. A number is an
/// idle timeout in milliseconds for tcp links; the queue then leaves the link open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisconnectPolicy {
    Flag(bool),
    IdleTimeout(u64),
}

impl Default for DisconnectPolicy {
    fn default() -> Self {
        DisconnectPolicy::Flag(true)
    }
}

impl DisconnectPolicy {
    pub fn closes_when_drained(&self) -> bool {
        matches!(self, DisconnectPolicy::Flag(true))
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        match self {
            DisconnectPolicy::IdleTimeout(ms) if *ms > 0 => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// Framing policy selector. When several policies are present the delimiter wins,
/// then the regex, then the timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitterConfig {
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub include_delimiter: bool,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            include_delimiter: false,
            regex: None,
            timeout: Some(default_splitter_timeout()),
        }
    }
}

impl SplitterConfig {
    pub fn delimiter(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: Some(delimiter.into()),
            timeout: None,
            ..Self::default()
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            regex: Some(pattern.into()),
            timeout: None,
            ..Self::default()
        }
    }

    pub fn timeout(ms: u64) -> Self {
        Self {
            timeout: Some(ms),
            ..Self::default()
        }
    }

    /// A selector with no policy at all.
    pub fn none() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }
}

/// Diagnostic file sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Record bytes coming from the device
    #[serde(default)]
    pub devlog: bool,
    /// Record both directions of the conversation
    #[serde(default)]
    pub talklog: bool,
    /// Where log files are created
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            devlog: false,
            talklog: false,
            directory: default_log_directory(),
        }
    }
}

/// Command to literal lookup table.
///
/// Cloning shares the underlying map, so one dictionary can serve several sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(Arc<HashMap<String, String>>);

impl Dictionary {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(Arc::new(entries))
    }

    pub fn get(&self, command: &str) -> Option<&str> {
        self.0.get(command).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for Dictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Dictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<String, String>::deserialize(deserializer).map(Self::new)
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Codec for commands and responses; `None` leaves response values unset
    #[serde(default = "default_encoding", with = "encoding::optional")]
    pub encoding: Option<Encoding>,
    /// Default pacing after each command, in milliseconds
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default)]
    pub disconnect: DisconnectPolicy,
    #[serde(default)]
    pub splitter: SplitterConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub dictionary: Dictionary,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            duration: default_duration(),
            disconnect: DisconnectPolicy::default(),
            splitter: SplitterConfig::default(),
            logger: LoggerConfig::default(),
            dictionary: Dictionary::default(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_ms() -> u64 {
    2000
}

fn default_device_name() -> String {
    "RAWdevice".to_string()
}

fn default_tcp_port() -> u16 {
    23
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_encoding() -> Option<Encoding> {
    Some(Encoding::Ascii)
}

fn default_duration() -> u64 {
    1500
}

fn default_splitter_timeout() -> u64 {
    1100
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            listen_ms: default_listen_ms(),
        }
    }
}
