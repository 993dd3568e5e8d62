//! The publish/subscribe capability the ping components are built on.
//!
//! Every component receives an `Arc<dyn Bus>` at construction instead of
//! reaching for a process-wide connection. Two implementations ship with the
//! crate: [`LocalBus`] over an in-process [`crate::broker::Broker`], and
//! [`crate::transport::RemoteBus`] over a WebSocket connection to a broker
//! served by another process.

mod local;

pub use local::LocalBus;

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

use crate::broker::message::Message;
use crate::utils::error::BusError;

/// Topic every worker listens on for start commands.
pub const START_TOPIC: &str = "ping.start";

/// Topic carrying the samples of one session.
pub fn result_topic(session_id: &str) -> String {
    format!("ping.result.{session_id}")
}

/// Topic-based fan-out messaging.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Publishes a payload to every current subscriber of `topic`.
    ///
    /// Having no subscribers is not an error.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;

    /// Subscribes to `topic`, buffering at most `capacity` undelivered
    /// messages. Deliveries that find the buffer full are dropped.
    async fn subscribe(&self, topic: &str, capacity: usize) -> Result<Subscription, BusError>;
}

type Release = Box<dyn FnOnce() + Send>;

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    receiver: Receiver<Message>,
    release: Option<Release>,
}

impl Subscription {
    /// Wraps a receiver; `release` runs exactly once when the subscription
    /// ends.
    pub fn new(
        topic: impl Into<String>,
        receiver: Receiver<Message>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            topic: topic.into(),
            receiver,
            release: Some(Box::new(release)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next message. `None` means the bus side is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Explicitly ends the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        self.receiver.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}
