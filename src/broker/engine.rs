//! Broker engine
//!
//! Responsibilities:
//! - managing topics and subscriber lists
//! - fanning published messages out to every subscriber of a topic
//!
//! Delivery never blocks: each subscriber owns a bounded buffer and a
//! delivery that finds it full is dropped for that subscriber only. Callers
//! should avoid holding the broker lock across network I/O.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::broker::topic::{SubscriberId, Topic};
use crate::client::Client;

#[derive(Debug, Default)]
pub struct Broker {
    pub topics: HashMap<String, Topic>,
    pub clients: HashMap<SubscriberId, Client>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    pub fn register_client(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    pub fn remove_client(&mut self, client_id: &SubscriberId) {
        self.clients.remove(client_id);
    }

    /// Subscribes a client to a topic, creating the topic on first use.
    pub fn subscribe(&mut self, topic: &str, subscriber: SubscriberId) {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(subscriber);
    }

    /// Unsubscribes a client from a topic. The topic is dropped once empty.
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &SubscriberId) {
        if let Some(t) = self.topics.get_mut(topic) {
            t.unsubscribe(subscriber);
            if t.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |t| t.subscribers.len())
    }

    /// Publishes a message to every subscriber of its topic and returns how
    /// many subscribers accepted it.
    pub fn publish(&self, msg: Message) -> usize {
        let Some(topic) = self.topics.get(&msg.topic) else {
            debug!("No subscribers for topic '{}'", msg.topic);
            return 0;
        };

        let mut delivered = 0;
        for sub_id in &topic.subscribers {
            let Some(client) = self.clients.get(sub_id) else {
                warn!("No client registered with id: {sub_id}");
                continue;
            };
            match client.deliver(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Buffer full for {sub_id}, dropping message on {}", msg.topic);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {sub_id} is gone, skipping {}", msg.topic);
                }
            }
        }
        delivered
    }

    /// Removes a client and detaches it from every topic.
    pub fn cleanup_client(&mut self, client_id: &SubscriberId) {
        self.remove_client(client_id);

        self.topics.retain(|name, topic| {
            if topic.subscribers.remove(client_id) {
                debug!("Unsubscribed {client_id} from topic {name}");
            }
            !topic.is_empty()
        });

        debug!("Cleaned up client {client_id}");
    }

    /// Drops every client and topic. Receivers held by subscribers observe
    /// the end of their stream.
    pub fn disconnect_all(&mut self) {
        self.clients.clear();
        self.topics.clear();
    }
}
