use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::RawComError;

/// Accepts input with or without `=` padding; output is always padded.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// String codecs a session can use for outbound commands and inbound responses.
///
/// Names follow the usual buffer codec vocabulary (`ascii`, `utf8`, `utf16le`/`ucs2`,
/// `latin1`/`binary`, `base64`, `hex`) and are matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Ascii,
    Utf8,
    Utf16Le,
    Latin1,
    Base64,
    Hex,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Utf8 => "utf8",
            Encoding::Utf16Le => "utf16le",
            Encoding::Latin1 => "latin1",
            Encoding::Base64 => "base64",
            Encoding::Hex => "hex",
        }
    }

    /// Turn `text` into bytes. Input that the codec cannot represent degrades to
    /// an empty buffer instead of failing.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Ascii | Encoding::Latin1 => text.chars().map(|c| (c as u32 & 0xFF) as u8).collect(),
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Base64 => BASE64.decode(text.trim()).unwrap_or_default(),
            Encoding::Hex => {
                // A dangling nibble is dropped
                let even = text.len() & !1;
                text.get(..even)
                    .and_then(|pairs| hex::decode(pairs).ok())
                    .unwrap_or_default()
            }
        }
    }

    /// Render `data` as text under this codec.
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            Encoding::Ascii => data.iter().map(|b| (b & 0x7F) as char).collect(),
            Encoding::Latin1 => data.iter().map(|&b| b as char).collect(),
            Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Encoding::Utf16Le => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            Encoding::Base64 => BASE64.encode(data),
            Encoding::Hex => hex::encode(data),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = RawComError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" => Ok(Encoding::Ascii),
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16Le),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "base64" => Ok(Encoding::Base64),
            "hex" => Ok(Encoding::Hex),
            other => Err(RawComError::config(format!("Unknown encoding '{}'", other))),
        }
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde glue for an optional encoding where `"none"` switches decoding off.
pub(crate) mod optional {
    use super::Encoding;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Encoding>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.map(|e| e.as_str()).unwrap_or("none"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Encoding>, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.is_empty() || name.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        name.parse().map(Some).map_err(serde::de::Error::custom)
    }
}
