use crate::core::communication::{
    directive::{self, Directive},
    message::{DeviceCommand, DeviceResponse},
};
use crate::domain::{
    config::{Dictionary, Options},
    encoding::Encoding,
};
use tracing::debug;

/// Result of encoding one queued command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Bytes to send (possibly empty) plus the pacing that follows
    Command(DeviceCommand),
    /// `#connect`
    Connect,
    /// `#close`
    Close,
    /// Unrecognized directive; nothing to do
    Ignored,
}

/// Turns command strings into transport payloads and framed chunks into responses.
#[derive(Debug, Clone)]
pub struct Codec {
    name: String,
    encoding: Option<Encoding>,
    duration: u64,
    dictionary: Dictionary,
}

impl Codec {
    pub fn new(name: impl Into<String>, options: &Options) -> Self {
        Self {
            name: name.into(),
            encoding: options.encoding,
            duration: options.duration,
            dictionary: options.dictionary.clone(),
        }
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    pub fn encode(&self, command: &str) -> Encoded {
        if command.starts_with('#') {
            return self.encode_directive(command);
        }

        let mut encodedstr = self
            .dictionary
            .get(command)
            .unwrap_or(command)
            .to_string();
        let mut encoding = self.encoding;

        if let Some(hex) = hex_form(&encodedstr) {
            encodedstr = hex;
            encoding = Some(Encoding::Hex);
        }

        // Without a configured encoding text goes out as its UTF-8 bytes
        let encoded = match encoding {
            Some(encoding) => encoding.encode(&encodedstr),
            None => encodedstr.as_bytes().to_vec(),
        };

        Encoded::Command(DeviceCommand {
            name: self.name.clone(),
            command: command.to_string(),
            encodedstr,
            encoded,
            duration: self.duration,
        })
    }

    fn encode_directive(&self, command: &str) -> Encoded {
        match directive::parse(command) {
            Some(Directive::Pause(duration)) => Encoded::Command(DeviceCommand::pause(
                self.name.clone(),
                command,
                duration.as_millis() as u64,
            )),
            Some(Directive::Connect) => Encoded::Connect,
            Some(Directive::Close) => Encoded::Close,
            None => {
                debug!("Ignoring unrecognized directive '{}' for '{}'", command, self.name);
                Encoded::Ignored
            }
        }
    }

    pub fn decode(&self, chunk: &[u8]) -> DeviceResponse {
        DeviceResponse {
            name: self.name.clone(),
            raw: chunk.to_vec(),
            value: self.encoding.map(|encoding| encoding.decode(chunk)),
        }
    }
}

/// The separator-free hex digits of `text` when it is a hex-encoded string.
///
/// Surrounding whitespace is trimmed and `x`, `:` and `-` separators removed first.
pub fn hex_form(text: &str) -> Option<String> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, 'x' | ':' | '-'))
        .collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec_with(options: Options) -> Codec {
        Codec::new("dev", &options)
    }

    fn command(encoded: Encoded) -> DeviceCommand {
        match encoded {
            Encoded::Command(cmd) => cmd,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[test]
    fn test_hex_with_separators() {
        let cmd = command(codec_with(Options::default()).encode("FF:01:02"));
        assert_eq!(cmd.encodedstr, "FF0102");
        assert_eq!(cmd.encoded, vec![0xFF, 0x01, 0x02]);
        assert_eq!(cmd.duration, 1500);

        let cmd = command(codec_with(Options::default()).encode("0a-0b-0c"));
        assert_eq!(cmd.encoded, vec![0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_plain_text() {
        let cmd = command(codec_with(Options::default()).encode("hello"));
        assert_eq!(cmd.encodedstr, "hello");
        assert_eq!(cmd.encoded, b"hello".to_vec());
        assert_eq!(cmd.command, "hello");
    }

    #[test]
    fn test_inner_whitespace_is_not_hex() {
        let cmd = command(codec_with(Options::default()).encode("AB CD"));
        assert_eq!(cmd.encoded, b"AB CD".to_vec());
    }

    #[test]
    fn test_dictionary_substitution() {
        let options = Options {
            dictionary: [("power on", "PWR1\r"), ("ping", "AA:55")].into_iter().collect(),
            ..Options::default()
        };
        let codec = codec_with(options);

        let cmd = command(codec.encode("power on"));
        assert_eq!(cmd.command, "power on");
        assert_eq!(cmd.encodedstr, "PWR1\r");
        assert_eq!(cmd.encoded, b"PWR1\r".to_vec());

        // Dictionary values still go through hex detection
        let cmd = command(codec.encode("ping"));
        assert_eq!(cmd.encodedstr, "AA55");
        assert_eq!(cmd.encoded, vec![0xAA, 0x55]);
    }

    #[test]
    fn test_empty_command_paces_only() {
        let cmd = command(codec_with(Options::default()).encode(""));
        assert!(cmd.encoded.is_empty());
        assert_eq!(cmd.duration, 1500);
    }

    #[test]
    fn test_directives() {
        let codec = codec_with(Options::default());
        let cmd = command(codec.encode("#pause 500"));
        assert!(cmd.encoded.is_empty());
        assert_eq!(cmd.duration, 500);

        assert_eq!(codec.encode("#connect"), Encoded::Connect);
        assert_eq!(codec.encode("#CLOSE"), Encoded::Close);
        assert_eq!(codec.encode("#bogus 1"), Encoded::Ignored);
    }

    #[test]
    fn test_decode_with_and_without_encoding() {
        let response = codec_with(Options::default()).decode(b"OK");
        assert_eq!(response.value.as_deref(), Some("OK"));
        assert_eq!(response.raw, b"OK".to_vec());

        let response = codec_with(Options {
            encoding: None,
            ..Options::default()
        })
        .decode(b"OK");
        assert_eq!(response.value, None);
        assert_eq!(response.raw, b"OK".to_vec());
    }

    proptest! {
        #[test]
        fn prop_hex_forms_encode_under_hex(bytes in proptest::collection::vec(any::<u8>(), 1..32), sep in prop_oneof![Just(""), Just(":"), Just("-"), Just("x")]) {
            let text = bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(sep);
            let cmd = command(codec_with(Options::default()).encode(&text));
            prop_assert_eq!(cmd.encodedstr, text.replace(sep, ""));
            prop_assert_eq!(cmd.encoded, bytes);
        }

        #[test]
        fn prop_text_round_trips(text in "[g-zG-Z ,.!?]{1,40}") {
            let codec = codec_with(Options::default());
            let cmd = command(codec.encode(&text));
            prop_assert_eq!(codec.decode(&cmd.encoded).value, Some(text));
        }
    }
}
