//! The `client` module defines how the broker sees a subscriber.
//!
//! A [`Client`] is either one local [`crate::bus::Subscription`] or one
//! WebSocket connection; in both cases it is an id plus the bounded channel
//! the broker delivers into.

pub mod pubsub_client;
pub use pubsub_client::Client;
