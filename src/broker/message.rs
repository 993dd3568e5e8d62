use serde::{Deserialize, Serialize};

/// A message routed by the broker.
///
/// # Fields
///
/// - `topic` - The name of the topic this message belongs to.
/// - `payload` - The message body, a JSON-encoded string for every topic the
///   ping protocol uses.
/// - `timestamp` - Milliseconds since the UNIX epoch at which the broker
///   accepted the message.
///
/// # Example
///
/// ```rust
/// use pingpong::broker::message::Message;
///
/// let msg = Message {
///     topic: "ping.result.req_1".to_string(),
///     payload: "{\"success\":true}".to_string(),
///     timestamp: 1_725_000_000_000,
/// };
/// assert_eq!(msg.topic, "ping.result.req_1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub timestamp: i64,
}

impl Message {
    /// Builds a message stamped with the current time.
    pub fn now(topic: &str, payload: String) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
