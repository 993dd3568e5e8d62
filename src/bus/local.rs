use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::bus::{Bus, Subscription};
use crate::client::Client;
use crate::utils::error::BusError;

/// A [`Bus`] backed by a broker living in this process.
///
/// Clones share the same broker, which may also be served to remote
/// processes through [`crate::transport::start_websocket_server`].
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    broker: Arc<Mutex<Broker>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broker(broker: Arc<Mutex<Broker>>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> Arc<Mutex<Broker>> {
        self.broker.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Broker>, BusError> {
        self.broker
            .lock()
            .map_err(|e| BusError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let delivered = self.lock()?.publish(Message::now(topic, payload));
        debug!("Published to {topic} ({delivered} deliveries)");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, capacity: usize) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Client::new(tx);
        let client_id = client.id.clone();
        {
            let mut broker = self.lock()?;
            broker.register_client(client);
            broker.subscribe(topic, client_id.clone());
        }
        debug!("{client_id} subscribed to {topic}");

        let broker = self.broker.clone();
        Ok(Subscription::new(topic, rx, move || match broker.lock() {
            Ok(mut broker) => broker.cleanup_client(&client_id),
            Err(e) => warn!("Could not release subscription {client_id}: {e}"),
        }))
    }
}
