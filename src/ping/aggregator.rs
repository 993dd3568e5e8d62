//! Stream aggregator
//!
//! Turns a session's result topic into a finite event sequence for one
//! requester: every sample in arrival order, then a single completion event
//! when the deadline passes. If the requester goes away first the relay
//! stops silently. The subscription is released on every exit path.
//!
//! ```text
//! Subscribed -> Relaying -> Completed   (deadline)
//!                        -> Aborted     (requester gone or stalled)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::bus::{Bus, Subscription, result_topic};
use crate::config::PingSettings;
use crate::ping::model::{PingResult, StreamEvent};
use crate::utils::error::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Subscribed,
    Relaying,
    Completed,
    Aborted,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Aborted)
    }
}

pub struct StreamAggregator {
    bus: Arc<dyn Bus>,
    deadline: Duration,
    buffer: usize,
}

impl StreamAggregator {
    pub fn new(bus: Arc<dyn Bus>, settings: &PingSettings) -> Self {
        Self::with_limits(bus, settings.stream_deadline(), settings.result_buffer)
    }

    pub fn with_limits(bus: Arc<dyn Bus>, deadline: Duration, buffer: usize) -> Self {
        Self {
            bus,
            deadline,
            buffer,
        }
    }

    /// Subscribes to the session's result topic. The deadline starts now.
    pub async fn open(&self, session_id: &str) -> Result<SessionStream, BusError> {
        let subscription = self
            .bus
            .subscribe(&result_topic(session_id), self.buffer)
            .await?;
        debug!("Subscribed to results of {session_id}");

        Ok(SessionStream {
            session_id: session_id.to_string(),
            subscription: Some(subscription),
            deadline: Instant::now() + self.deadline,
            state: StreamState::Subscribed,
        })
    }
}

/// One requester's view of a session.
pub struct SessionStream {
    session_id: String,
    subscription: Option<Subscription>,
    deadline: Instant,
    state: StreamState,
}

impl SessionStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Relays events into `sink` until the deadline passes or `sink` is
    /// closed, and returns the terminal state reached. Waiting for room in
    /// `sink` never extends past the deadline.
    pub async fn relay(mut self, sink: mpsc::Sender<StreamEvent>) -> StreamState {
        let Some(mut subscription) = self.subscription.take() else {
            return self.state;
        };
        self.state = StreamState::Relaying;

        let deadline = tokio::time::sleep_until(self.deadline);
        tokio::pin!(deadline);
        let mut feed_open = true;
        let mut relayed = 0usize;

        let state = loop {
            tokio::select! {
                _ = sink.closed() => break StreamState::Aborted,
                _ = &mut deadline => break complete(&self.session_id, &sink),
                msg = subscription.recv(), if feed_open => match msg {
                    Some(msg) => {
                        let Some(event) = decode_sample(&self.session_id, &msg.payload) else {
                            continue;
                        };
                        // a stalled requester must not hold the stream past its deadline
                        tokio::select! {
                            sent = sink.send(event) => {
                                if sent.is_err() {
                                    break StreamState::Aborted;
                                }
                            }
                            _ = &mut deadline => break complete(&self.session_id, &sink),
                        }
                        relayed += 1;
                    }
                    None => {
                        warn!("Result feed for {} ended before the deadline", self.session_id);
                        feed_open = false;
                    }
                },
            }
        };

        subscription.unsubscribe();
        debug!(
            "Stream for {} ended {:?} after {relayed} samples",
            self.session_id, state
        );
        state
    }

    /// Runs [`SessionStream::relay`] on its own task and hands back the
    /// receiving end. Dropping the returned stream aborts the relay.
    pub fn into_stream(self, buffer: usize) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::spawn(self.relay(tx));
        ReceiverStream::new(rx)
    }
}

/// Queues the completion event without waiting. A requester whose buffer is
/// still full at the deadline is not reading and gets cut off.
fn complete(session_id: &str, sink: &mpsc::Sender<StreamEvent>) -> StreamState {
    match sink.try_send(StreamEvent::completed()) {
        Ok(()) => StreamState::Completed,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Requester of {session_id} stopped reading, closing at the deadline");
            StreamState::Aborted
        }
        Err(mpsc::error::TrySendError::Closed(_)) => StreamState::Aborted,
    }
}

fn decode_sample(session_id: &str, payload: &str) -> Option<StreamEvent> {
    match serde_json::from_str::<PingResult>(payload) {
        Ok(result) => Some(StreamEvent::Sample(result)),
        Err(e) => {
            warn!("Skipping unreadable sample for {session_id}: {e}");
            None
        }
    }
}
