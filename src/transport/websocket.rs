//! WebSocket transport
//!
//! A minimal WebSocket server that translates protocol JSON frames into
//! broker operations:
//! - accept TCP/WebSocket connections
//! - register one `Client` per connection with the `Broker`
//! - forward broker deliveries back to the connection as `message` frames
//! - detach the client from every topic when the connection ends

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::client::Client;
use crate::config::BrokerSettings;
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::{BusError, PingError};

/// Binds the configured address and serves the broker until the listener
/// fails to bind.
pub async fn start_websocket_server(
    broker: Arc<Mutex<Broker>>,
    settings: BrokerSettings,
) -> Result<(), PingError> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Broker listening on ws://{addr}");

    serve(listener, broker, settings.client_buffer).await;
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, broker: Arc<Mutex<Broker>>, client_buffer: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                spawn(handle_connection(stream, peer, broker.clone(), client_buffer));
            }
            Err(e) => warn!("Failed to accept broker connection: {e}"),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    broker: Arc<Mutex<Broker>>,
    client_buffer: usize,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error from {peer}: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(client_buffer.max(1));
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let client_id = format!("client-{}", uuid::Uuid::new_v4());
    match broker.lock() {
        Ok(mut broker) => broker.register_client(Client::with_id(client_id.clone(), tx)),
        Err(e) => {
            warn!("Rejecting {peer}: {e}");
            return;
        }
    }
    info!("{client_id} connected from {peer}");

    let cleanup_called = Arc::new(AtomicBool::new(false));

    let do_cleanup = {
        let broker = broker.clone();
        let client_id = client_id.clone();
        let cleanup_called = cleanup_called.clone();

        move || {
            if !cleanup_called.swap(true, Ordering::SeqCst) {
                if let Ok(mut broker) = broker.lock() {
                    broker.cleanup_client(&client_id);
                }
            }
        }
    };

    {
        let client_id = client_id.clone();
        let do_cleanup = do_cleanup.clone();

        spawn(async move {
            loop {
                let frame = tokio::select! {
                    Some(msg) = rx.recv() => ServerMessage::from(msg),
                    Some(reply) = reply_rx.recv() => reply,
                    else => break,
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize frame for {client_id}: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    debug!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }

            do_cleanup();
            debug!("Send loop closed for {client_id}");
        });
    }

    while let Some(frame) = ws_receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Read error from {client_id}: {e}");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        if !frame.is_text() {
            continue;
        }
        let Ok(text) = frame.to_text() else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => {
                if let Err(e) = handle_client_message(&broker, &client_id, msg) {
                    warn!("{client_id}: {e}");
                    break;
                }
            }
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    text.chars().take(100).collect::<String>()
                );
                let _ = reply_tx.send(ServerMessage::Error {
                    message: format!("invalid frame: {err}"),
                });
            }
        }
    }

    do_cleanup();
    info!("{client_id} disconnected");
}

/// Applies one client frame to the broker.
pub(crate) fn handle_client_message(
    broker: &Mutex<Broker>,
    client_id: &str,
    msg: ClientMessage,
) -> Result<(), BusError> {
    let mut broker = broker
        .lock()
        .map_err(|e| BusError::Unavailable(e.to_string()))?;

    match msg {
        ClientMessage::Subscribe { topic } => {
            broker.subscribe(&topic, client_id.to_string());
            debug!("{client_id} subscribed to {topic}");
        }
        ClientMessage::Unsubscribe { topic } => {
            broker.unsubscribe(&topic, &client_id.to_string());
            debug!("{client_id} unsubscribed from {topic}");
        }
        ClientMessage::Publish { topic, payload } => {
            let delivered = broker.publish(Message::now(&topic, payload));
            debug!("{client_id} published to {topic} ({delivered} deliveries)");
        }
    }
    Ok(())
}
