//! The in-memory topic broker.
//!
//! The broker routes [`message::Message`]s from publishers to every
//! subscriber of a topic. It is synchronous and meant to sit behind a lock
//! (`Arc<Mutex<Broker>>`) shared by the local bus and the WebSocket transport.

pub mod engine;
pub mod message;
pub mod topic;

pub use engine::Broker;

#[cfg(test)]
mod tests;
