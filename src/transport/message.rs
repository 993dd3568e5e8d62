use serde::{Deserialize, Serialize};

use crate::broker::message::Message;

/// Frames sent by a connected process to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },

    #[serde(rename = "publish")]
    Publish { topic: String, payload: String },
}

/// Frames sent by the broker to a connected process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl From<Message> for ServerMessage {
    fn from(msg: Message) -> Self {
        ServerMessage::Message {
            topic: msg.topic,
            payload: msg.payload,
            timestamp: msg.timestamp,
        }
    }
}
