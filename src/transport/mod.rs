//! The `transport` module exposes the broker to other processes over
//! WebSockets.
//!
//! The API process serves its broker with [`start_websocket_server`]; worker
//! processes reach it through [`RemoteBus`], which implements the same
//! [`crate::bus::Bus`] capability as the in-process bus.

pub mod message;
pub mod remote;
pub mod websocket;

pub use message::{ClientMessage, ServerMessage};
pub use remote::RemoteBus;
pub use websocket::{serve, start_websocket_server};
