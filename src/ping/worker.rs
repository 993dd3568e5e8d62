use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::{Bus, START_TOPIC, Subscription};
use crate::ping::model::PingCommand;
use crate::ping::sampler::Sampler;
use crate::utils::error::BusError;

/// Start commands buffered while the worker is busy spawning.
const START_BUFFER: usize = 64;

/// Listens on the start topic and runs one sampling loop per command.
pub struct Worker {
    bus: Arc<dyn Bus>,
    sampler: Arc<Sampler>,
}

impl Worker {
    pub fn new(bus: Arc<dyn Bus>, sampler: Arc<Sampler>) -> Self {
        Self { bus, sampler }
    }

    /// Subscribes to the start topic, then serves it in the background.
    /// Commands published after this returns are seen by the worker.
    pub async fn start(self) -> Result<JoinHandle<()>, BusError> {
        let starts = self.bus.subscribe(START_TOPIC, START_BUFFER).await?;
        info!(
            "Worker [{}] listening on {START_TOPIC}",
            self.sampler.worker_id()
        );
        Ok(tokio::spawn(self.serve(starts)))
    }

    /// Subscribes and serves until the bus goes away.
    pub async fn run(self) -> Result<(), BusError> {
        let starts = self.bus.subscribe(START_TOPIC, START_BUFFER).await?;
        info!(
            "Worker [{}] listening on {START_TOPIC}",
            self.sampler.worker_id()
        );
        self.serve(starts).await;
        Ok(())
    }

    async fn serve(self, mut starts: Subscription) {
        while let Some(msg) = starts.recv().await {
            match decode_command(&msg.payload) {
                Ok(cmd) => {
                    info!(
                        "[{}] testing {} for {}s ({})",
                        self.sampler.worker_id(),
                        cmd.target_url,
                        cmd.duration_seconds,
                        cmd.session_id
                    );
                    self.sampler.spawn(cmd);
                }
                Err(reason) => warn!("invalid {START_TOPIC} payload: {reason}"),
            }
        }
        info!(
            "Worker [{}] stopped: start subscription closed",
            self.sampler.worker_id()
        );
    }
}

/// Parses a start command, rejecting ones that would sample nothing.
pub fn decode_command(payload: &str) -> Result<PingCommand, String> {
    let cmd: PingCommand = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    if cmd.duration_seconds == 0 {
        return Err(format!("session {} asks for zero samples", cmd.session_id));
    }
    if cmd.target_url.trim().is_empty() {
        return Err(format!("session {} has no target", cmd.session_id));
    }
    Ok(cmd)
}
