// Core module - Device sessions and the encode/decode pipeline
pub mod communication;
pub mod session;
