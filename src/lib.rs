//! RawCom Library
//!
//! Device session manager: paced command queues over TCP, serial or caller supplied
//! streams, with framed and decoded responses published as events.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::config::{Address, DisconnectPolicy, Options, RawComConfig, SplitterConfig, TransportMode};
pub use crate::domain::encoding::Encoding;
pub use crate::domain::error::{RawComError, RawComResult};
pub use crate::core::communication::{ConnectionStatus, DeviceCommand, DeviceEvent, DeviceResponse};
pub use crate::core::session::{Session, SessionManager};
