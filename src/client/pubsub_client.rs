use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::broker::message::Message;

/// A subscriber registered with the broker.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the client.
    pub id: String,

    /// Bounded channel the broker delivers messages into.
    pub sender: Sender<Message>,
}

impl Client {
    /// Create a new client with a fresh UUID.
    pub fn new(sender: Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
        }
    }

    /// Create a client with a caller-chosen id, used by the WebSocket
    /// transport so log lines name the connection.
    pub fn with_id(id: impl Into<String>, sender: Sender<Message>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    /// Hands a message to the client without waiting for buffer space.
    pub fn deliver(&self, msg: Message) -> Result<(), TrySendError<Message>> {
        self.sender.try_send(msg)
    }
}
