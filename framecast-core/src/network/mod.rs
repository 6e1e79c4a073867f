//! Socket-level transport.

pub mod connection;

pub use connection::{StreamConnection, StreamListener};
