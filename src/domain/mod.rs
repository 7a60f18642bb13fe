// Domain module - Configuration, encodings and errors
pub mod config;
pub mod encoding;
pub mod error;
