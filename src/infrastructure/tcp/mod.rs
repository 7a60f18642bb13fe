// TCP module - TCP communication implementation
pub mod client;

pub use client::TcpTransport;
