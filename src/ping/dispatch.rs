//! Command dispatcher
//!
//! Validates a measurement request, mints the session id and broadcasts the
//! start command once on `ping.start`. Nobody acknowledges the broadcast; a
//! request nobody answers simply produces an empty stream.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::bus::{Bus, START_TOPIC};
use crate::config::PingSettings;
use crate::ping::model::PingCommand;
use crate::utils::error::DispatchError;

/// An inbound request for a latency test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeasurementRequest {
    pub target: Option<String>,
    /// Sample count override.
    pub duration: Option<u32>,
}

impl MeasurementRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }
}

pub struct Dispatcher {
    bus: Arc<dyn Bus>,
    default_duration: u32,
    max_duration: u32,
}

impl Dispatcher {
    pub fn new(bus: Arc<dyn Bus>, settings: &PingSettings) -> Self {
        Self {
            bus,
            default_duration: settings.duration_secs,
            max_duration: settings.max_duration_secs,
        }
    }

    /// Validates the request and builds its start command without touching
    /// the bus.
    pub fn prepare(&self, request: &MeasurementRequest) -> Result<PingCommand, DispatchError> {
        let target = request
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                DispatchError::InvalidRequest("'target' parameter is required".to_string())
            })?;

        let url = Url::parse(target)
            .map_err(|e| DispatchError::InvalidRequest(format!("invalid target '{target}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
            return Err(DispatchError::InvalidRequest(format!(
                "target '{target}' must be an absolute http or https url"
            )));
        }

        let duration = request.duration.unwrap_or(self.default_duration);
        if duration == 0 || duration > self.max_duration {
            return Err(DispatchError::InvalidRequest(format!(
                "duration must be between 1 and {} seconds",
                self.max_duration
            )));
        }

        Ok(PingCommand {
            session_id: new_session_id(),
            target_url: target.to_string(),
            duration_seconds: duration,
        })
    }

    /// Publishes the start command exactly once.
    pub async fn broadcast(&self, cmd: &PingCommand) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(cmd)?;
        self.bus.publish(START_TOPIC, payload).await?;
        info!(
            "Dispatched {} -> {} for {}s",
            cmd.session_id, cmd.target_url, cmd.duration_seconds
        );
        Ok(())
    }

    /// [`Dispatcher::prepare`] followed by [`Dispatcher::broadcast`].
    pub async fn dispatch(&self, request: &MeasurementRequest) -> Result<PingCommand, DispatchError> {
        let cmd = self.prepare(request)?;
        self.broadcast(&cmd).await?;
        Ok(cmd)
    }
}

/// `req_<unix millis>_<random>`
pub fn new_session_id() -> String {
    format!(
        "req_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}
