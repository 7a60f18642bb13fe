// Serial module - Serial communication implementation
pub mod client;

pub use client::{available_ports, SerialSettings, SerialTransport};
