use serde::{Deserialize, Serialize};
use std::fmt;

/// An outbound command after encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Device name
    pub name: String,
    /// Command exactly as the caller submitted it
    pub command: String,
    /// The string that was actually encoded (after dictionary and hex handling)
    pub encodedstr: String,
    /// Bytes for the transport; empty means pace only
    pub encoded: Vec<u8>,
    /// Pacing after this command, in milliseconds
    pub duration: u64,
}

impl DeviceCommand {
    /// A command that transmits nothing and only holds the queue for `duration` ms.
    pub fn pause(name: impl Into<String>, command: impl Into<String>, duration: u64) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            encodedstr: String::new(),
            encoded: Vec::new(),
            duration,
        }
    }

    pub fn is_transmittable(&self) -> bool {
        !self.encoded.is_empty()
    }

    /// Get encoded bytes as hex string
    pub fn encoded_as_hex(&self) -> String {
        self.encoded
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A framed chunk received from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub name: String,
    pub raw: Vec<u8>,
    /// Decoded text, unset when the session has no encoding
    pub value: Option<String>,
}

/// Connection status reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// TCP socket connected
    Connected,
    /// Serial port opened
    Opened,
    Closed,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Opened => write!(f, "opened"),
            ConnectionStatus::Closed => write!(f, "closed"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Everything a session publishes to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// The link changed state
    ConnectionStatus {
        name: String,
        address: String,
        status: ConnectionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        more: Option<String>,
    },
    /// Raw bytes as they arrived, before framing
    ConnectionData {
        name: String,
        address: String,
        data: Vec<u8>,
    },
    /// A decoded, framed response
    ResponseFromDevice(DeviceResponse),
    /// A command was physically written
    CommandForDevice(DeviceCommand),
}

impl DeviceEvent {
    /// Device name carried by every event
    pub fn name(&self) -> &str {
        match self {
            DeviceEvent::ConnectionStatus { name, .. } | DeviceEvent::ConnectionData { name, .. } => name,
            DeviceEvent::ResponseFromDevice(response) => &response.name,
            DeviceEvent::CommandForDevice(command) => &command.name,
        }
    }

    /// Event kind as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceEvent::ConnectionStatus { .. } => "connectionStatus",
            DeviceEvent::ConnectionData { .. } => "connectionData",
            DeviceEvent::ResponseFromDevice(_) => "responseFromDevice",
            DeviceEvent::CommandForDevice(_) => "commandForDevice",
        }
    }
}
