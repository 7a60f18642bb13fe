use crate::cli::args::OutputFormat;
use crate::core::communication::DeviceEvent;
use crate::domain::config::{DeviceProfile, RawComConfig};
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_event(&self, event: &DeviceEvent) -> Result<(), OutputError>;
    fn write_ports(&self, ports: &[String]) -> Result<(), OutputError>;
    fn write_config(&self, config: &RawComConfig) -> Result<(), OutputError>;
    fn write_devices(&self, devices: &[DeviceProfile]) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::RawComError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_event(&self, event: &DeviceEvent) -> Result<(), OutputError> {
        match self.format {
            // One object per line so the stream can be piped
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Text | OutputFormat::Table => println!("{}", format_event(event)),
        }
        Ok(())
    }

    fn write_ports(&self, ports: &[String]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("{}", port);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(ports)?);
            }
            OutputFormat::Table => {
                let rows: Vec<PortTableRow> = ports.iter().map(|port| PortTableRow { port: port.clone() }).collect();
                println!("{}", Table::new(rows));
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &RawComConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("RawCom Configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  Listen window: {}ms", config.global.listen_ms);

                if !config.devices.is_empty() {
                    println!("  Devices:");
                    for device in &config.devices {
                        println!("    {}: {}", device.address.name, describe(device));
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table => {
                let rows: Vec<DeviceTableRow> = config.devices.iter().map(DeviceTableRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
        Ok(())
    }

    fn write_devices(&self, devices: &[DeviceProfile]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                for device in devices {
                    println!("Device: {}", device.address.name);
                    println!("  Description: {}", describe(device));
                    println!("  Transport: {}", device.address.resolved_mode());
                    println!("  Address: {}", device.address.display_string());
                    println!();
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(devices)?);
            }
            OutputFormat::Table => {
                if !devices.is_empty() {
                    let rows: Vec<DeviceTableRow> = devices.iter().map(DeviceTableRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// One line per event in text mode
pub fn format_event(event: &DeviceEvent) -> String {
    match event {
        DeviceEvent::ConnectionStatus {
            name,
            address,
            status,
            more,
        } => match more {
            Some(more) => format!("[{}] {} {}: {}", name, status, address, more),
            None => format!("[{}] {} {}", name, status, address),
        },
        DeviceEvent::ConnectionData { name, data, .. } => {
            format!("[{}] {} bytes received", name, data.len())
        }
        DeviceEvent::ResponseFromDevice(response) => match &response.value {
            Some(value) => format!("[{}] < {}", response.name, value.escape_debug()),
            None => format!("[{}] < {}", response.name, hex::encode(&response.raw)),
        },
        DeviceEvent::CommandForDevice(command) => {
            format!("[{}] > {} ({})", command.name, command.command.escape_debug(), command.encoded_as_hex())
        }
    }
}

fn describe(device: &DeviceProfile) -> &str {
    if device.description.is_empty() {
        "No description"
    } else {
        &device.description
    }
}

/// Table row for device configuration
#[derive(Tabled)]
struct DeviceTableRow {
    name: String,
    description: String,
    transport: String,
    address: String,
}

impl From<&DeviceProfile> for DeviceTableRow {
    fn from(device: &DeviceProfile) -> Self {
        Self {
            name: device.address.name.clone(),
            description: device.description.clone(),
            transport: device.address.resolved_mode().to_string(),
            address: device.address.display_string(),
        }
    }
}

/// Table row for serial ports
#[derive(Tabled)]
struct PortTableRow {
    port: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::{ConnectionStatus, DeviceCommand, DeviceResponse};

    #[test]
    fn test_format_status() {
        let event = DeviceEvent::ConnectionStatus {
            name: "projector".to_string(),
            address: "10.0.0.5:23".to_string(),
            status: ConnectionStatus::Error,
            more: Some("connection refused".to_string()),
        };
        assert_eq!(format_event(&event), "[projector] error 10.0.0.5:23: connection refused");
    }

    #[test]
    fn test_format_response() {
        let decoded = DeviceEvent::ResponseFromDevice(DeviceResponse {
            name: "projector".to_string(),
            raw: b"PWR=1\r".to_vec(),
            value: Some("PWR=1\r".to_string()),
        });
        assert_eq!(format_event(&decoded), "[projector] < PWR=1\\r");

        let raw = DeviceEvent::ResponseFromDevice(DeviceResponse {
            name: "projector".to_string(),
            raw: vec![0xff, 0x01],
            value: None,
        });
        assert_eq!(format_event(&raw), "[projector] < ff01");
    }

    #[test]
    fn test_format_command() {
        let event = DeviceEvent::CommandForDevice(DeviceCommand {
            name: "projector".to_string(),
            command: "on".to_string(),
            encodedstr: "PWR1\r".to_string(),
            encoded: b"PWR1\r".to_vec(),
            duration: 1500,
        });
        assert_eq!(format_event(&event), "[projector] > on (50 57 52 31 0d)");
    }
}
