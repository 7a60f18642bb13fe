use crate::domain::config::{DisconnectPolicy, Options, ParityConfig, SplitterConfig};
use crate::domain::encoding::Encoding;
use crate::domain::error::RawComResult;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command line arguments for RawCom
#[derive(Parser, Debug)]
#[command(
    name = "rawcom",
    version = env!("CARGO_PKG_VERSION"),
    about = "Send paced raw commands to devices over TCP or serial lines",
    long_about = "Opens a session to a device, sends each command in order with a pause after it, \
                  and prints everything the device answers as framed responses."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Talk to a device over TCP
    Tcp(TcpArgs),
    /// Talk to a device over a serial line
    Serial(SerialArgs),
    /// Talk to a device profile from the configuration
    Device(DeviceArgs),
    /// List available serial ports
    Ports,
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output, one event per line
    Json,
    /// Table output for listings
    Table,
}

/// TCP session arguments
#[derive(ClapArgs, Debug)]
pub struct TcpArgs {
    /// Device host name or IP address
    pub host: String,

    /// Device port
    #[arg(short, long, default_value = "23")]
    pub port: u16,

    /// Device name used in events and log file names
    #[arg(long)]
    pub name: Option<String>,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "3000")]
    pub connect_timeout: u64,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Commands to send, in order
    pub commands: Vec<String>,
}

/// Serial session arguments
#[derive(ClapArgs, Debug)]
pub struct SerialArgs {
    /// Serial port path
    pub path: String,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    pub baud: u32,

    /// Data bits
    #[arg(long, default_value = "8")]
    pub data_bits: u8,

    /// Stop bits
    #[arg(long, default_value = "1")]
    pub stop_bits: u8,

    /// Parity (none, even, odd)
    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParityArg,

    /// Device name used in events and log file names
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Commands to send, in order
    pub commands: Vec<String>,
}

/// Profile session arguments
#[derive(ClapArgs, Debug)]
pub struct DeviceArgs {
    /// Device profile name
    pub profile: String,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Commands to send, in order
    pub commands: Vec<String>,
}

/// Session options; anything given here overrides the profile or the defaults
#[derive(ClapArgs, Debug, Default)]
pub struct SessionArgs {
    /// Encoding (ascii, utf8, utf16le, latin1, base64, hex, none)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Pause after each command in milliseconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Keep the link open once all commands were sent
    #[arg(long)]
    pub keep_open: bool,

    /// Close a TCP link after this many milliseconds without traffic
    #[arg(long, conflicts_with = "keep_open")]
    pub idle_timeout: Option<u64>,

    /// Split responses on this delimiter (escapes allowed)
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Keep the delimiter at the end of each response
    #[arg(long)]
    pub include_delimiter: bool,

    /// Split responses on matches of this regular expression
    #[arg(long)]
    pub regex: Option<String>,

    /// Split responses after this many milliseconds of silence
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Record inbound bytes to dev_<name>_<time>.log
    #[arg(long)]
    pub devlog: bool,

    /// Record the whole conversation to talk_<name>_<time>.log
    #[arg(long)]
    pub talklog: bool,

    /// Directory for traffic log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Keep listening this many milliseconds after the last command
    #[arg(short, long)]
    pub listen: Option<u64>,
}

impl SessionArgs {
    /// Overlay the flags that were given onto `options`
    pub fn apply_to(&self, options: &mut Options) -> RawComResult<()> {
        if let Some(name) = &self.encoding {
            options.encoding = if name.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(name.parse::<Encoding>()?)
            };
        }
        if let Some(duration) = self.duration {
            options.duration = duration;
        }
        if self.keep_open {
            options.disconnect = DisconnectPolicy::Flag(false);
        }
        if let Some(ms) = self.idle_timeout {
            options.disconnect = DisconnectPolicy::IdleTimeout(ms);
        }
        if self.delimiter.is_some() || self.regex.is_some() || self.timeout.is_some() {
            options.splitter = SplitterConfig {
                delimiter: self.delimiter.as_deref().map(unescape),
                include_delimiter: self.include_delimiter,
                regex: self.regex.clone(),
                timeout: self.timeout,
            };
        }
        options.logger.devlog |= self.devlog;
        options.logger.talklog |= self.talklog;
        if let Some(dir) = &self.log_dir {
            options.logger.directory = dir.clone();
        }
        Ok(())
    }
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Initialize an example project configuration
    Init {
        /// Directory to create .rawcom/config.toml in
        #[arg(short = 'd', long)]
        dir: Option<PathBuf>,
        /// Write the global configuration instead
        #[arg(long)]
        global: bool,
    },
    /// List configured device profiles
    Devices,
}

/// Parity options
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for ParityConfig {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => ParityConfig::None,
            ParityArg::Even => ParityConfig::Even,
            ParityArg::Odd => ParityConfig::Odd,
        }
    }
}

/// Expand `\r`, `\n`, `\t` and `\\` as typed on a shell command line. Other
/// backslash sequences are kept as they are.
pub fn unescape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => output.push('\r'),
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('\\') => output.push('\\'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_args() {
        let args = Args::try_parse_from([
            "rawcom", "tcp", "10.0.0.5", "-p", "4001", "--delimiter", "\\r", "PWR?\\r", "#pause 500",
        ])
        .unwrap();

        let Command::Tcp(tcp) = args.command else {
            panic!("expected tcp command");
        };
        assert_eq!(tcp.host, "10.0.0.5");
        assert_eq!(tcp.port, 4001);
        assert_eq!(tcp.commands, vec!["PWR?\\r", "#pause 500"]);
        assert_eq!(tcp.session.delimiter.as_deref(), Some("\\r"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["rawcom", "ports", "-o", "json", "-v"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn test_keep_open_conflicts_with_idle_timeout() {
        let result = Args::try_parse_from([
            "rawcom", "tcp", "host", "--keep-open", "--idle-timeout", "500",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_session_args() {
        let session = SessionArgs {
            encoding: Some("HEX".to_string()),
            duration: Some(200),
            keep_open: true,
            delimiter: Some("\\r\\n".to_string()),
            talklog: true,
            ..SessionArgs::default()
        };
        let mut options = Options::default();
        session.apply_to(&mut options).unwrap();

        assert_eq!(options.encoding, Some(Encoding::Hex));
        assert_eq!(options.duration, 200);
        assert_eq!(options.disconnect, DisconnectPolicy::Flag(false));
        assert_eq!(options.splitter.delimiter.as_deref(), Some("\r\n"));
        assert_eq!(options.splitter.timeout, None);
        assert!(options.logger.talklog);
        assert!(!options.logger.devlog);
    }

    #[test]
    fn test_untouched_options_survive() {
        let mut options = Options::default();
        options.duration = 42;
        SessionArgs::default().apply_to(&mut options).unwrap();
        assert_eq!(options, Options { duration: 42, ..Options::default() });
    }

    #[test]
    fn test_bad_encoding() {
        let session = SessionArgs {
            encoding: Some("ebcdic".to_string()),
            ..SessionArgs::default()
        };
        assert!(session.apply_to(&mut Options::default()).is_err());

        let session = SessionArgs {
            encoding: Some("none".to_string()),
            ..SessionArgs::default()
        };
        let mut options = Options::default();
        session.apply_to(&mut options).unwrap();
        assert_eq!(options.encoding, None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("PWR?\\r"), "PWR?\r");
        assert_eq!(unescape("a\\tb\\nc"), "a\tb\nc");
        assert_eq!(unescape("back\\\\slash"), "back\\slash");
        assert_eq!(unescape("\\x41"), "\\x41");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
