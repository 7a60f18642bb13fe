// Communication module - Encode/decode pipeline and transport abstraction
pub mod codec;
pub mod directive;
pub mod framer;
pub mod message;
pub mod transport;

pub use codec::{Codec, Encoded};
pub use directive::Directive;
pub use framer::{Framer, FramingPolicy};
pub use message::{ConnectionStatus, DeviceCommand, DeviceEvent, DeviceResponse};
pub use transport::{Transport, TransportEvent, TransportEvents, TransportState};
