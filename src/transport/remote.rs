//! A [`Bus`] that talks to a broker in another process.
//!
//! One WebSocket connection is shared by every subscription made through the
//! same `RemoteBus`. Inbound `message` frames are re-published into a local
//! broker that demultiplexes them to the matching subscriptions, so the
//! upstream broker only sees one subscriber per topic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::bus::{Bus, Subscription};
use crate::client::Client;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::BusError;

#[derive(Debug, Clone)]
pub struct RemoteBus {
    outgoing: UnboundedSender<ClientMessage>,
    inbound: Arc<Mutex<Broker>>,
    connected: Arc<AtomicBool>,
}

impl RemoteBus {
    /// Connects to a broker served by [`crate::transport::start_websocket_server`].
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let inbound = Arc::new(Mutex::new(Broker::new()));
        let connected = Arc::new(AtomicBool::new(true));

        {
            let connected = connected.clone();
            tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    let text = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize bus frame: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                        warn!("Broker connection lost while sending: {e}");
                        break;
                    }
                }
                connected.store(false, Ordering::SeqCst);
                let _ = ws_sender.close().await;
            });
        }

        {
            let inbound = inbound.clone();
            let connected = connected.clone();
            tokio::spawn(async move {
                while let Some(frame) = ws_receiver.next().await {
                    match frame {
                        Ok(WsMessage::Text(text)) => route_frame(&inbound, text.as_str()),
                        Ok(WsMessage::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Broker connection lost while reading: {e}");
                            break;
                        }
                    }
                }
                connected.store(false, Ordering::SeqCst);
                if let Ok(mut broker) = inbound.lock() {
                    broker.disconnect_all();
                }
                info!("Disconnected from broker");
            });
        }

        info!("Connected to broker at {url}");
        Ok(Self {
            outgoing,
            inbound,
            connected,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }

    fn send(&self, frame: ClientMessage) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::Disconnected);
        }
        self.outgoing
            .send(frame)
            .map_err(|_| BusError::Disconnected)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Broker>, BusError> {
        self.inbound
            .lock()
            .map_err(|e| BusError::Unavailable(e.to_string()))
    }
}

fn route_frame(inbound: &Mutex<Broker>, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Message {
            topic,
            payload,
            timestamp,
        }) => {
            if let Ok(broker) = inbound.lock() {
                broker.publish(Message {
                    topic,
                    payload,
                    timestamp,
                });
            }
        }
        Ok(ServerMessage::Error { message }) => warn!("Broker reported an error: {message}"),
        Err(e) => warn!("Unreadable frame from broker: {e}"),
    }
}

#[async_trait]
impl Bus for RemoteBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        self.send(ClientMessage::Publish {
            topic: topic.to_string(),
            payload,
        })
    }

    async fn subscribe(&self, topic: &str, capacity: usize) -> Result<Subscription, BusError> {
        if !self.is_connected() {
            return Err(BusError::Disconnected);
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Client::new(tx);
        let client_id = client.id.clone();
        {
            let mut broker = self.lock()?;
            broker.register_client(client);
            broker.subscribe(topic, client_id.clone());
            // upstream frames go out under the lock so they follow the local count
            if broker.subscriber_count(topic) == 1 {
                let sent = self.send(ClientMessage::Subscribe {
                    topic: topic.to_string(),
                });
                if let Err(e) = sent {
                    broker.cleanup_client(&client_id);
                    return Err(e);
                }
                debug!("Subscribed upstream to {topic}");
            }
        }

        let inbound = self.inbound.clone();
        let outgoing = self.outgoing.clone();
        let owned_topic = topic.to_string();
        Ok(Subscription::new(topic, rx, move || {
            let Ok(mut broker) = inbound.lock() else {
                return;
            };
            broker.cleanup_client(&client_id);
            if broker.subscriber_count(&owned_topic) == 0 {
                debug!("Unsubscribing upstream from {owned_topic}");
                let _ = outgoing.send(ClientMessage::Unsubscribe { topic: owned_topic });
            }
        }))
    }
}
