//! Sampling loop
//!
//! Runs the probe `duration_seconds` times for one session and publishes
//! every outcome to the session's result topic as soon as it is known.
//! Once spawned a loop is never cancelled: it always takes its full sample
//! count, whether or not anybody is still listening.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Bus, result_topic};
use crate::ping::model::{Metrics, PingCommand, PingResult};
use crate::ping::probe::{Probe, ProbeFailure};
use crate::utils::error::BusError;

/// What one loop did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SamplingReport {
    pub attempts: u32,
    pub failures: u32,
    pub publish_errors: u32,
}

pub struct Sampler {
    bus: Arc<dyn Bus>,
    probe: Arc<dyn Probe>,
    worker_id: String,
    interval: Duration,
}

impl Sampler {
    pub fn new(
        bus: Arc<dyn Bus>,
        probe: Arc<dyn Probe>,
        worker_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            bus,
            probe,
            worker_id: worker_id.into(),
            interval,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Starts a detached loop for `cmd`. Dropping the handle does not stop it.
    pub fn spawn(self: &Arc<Self>, cmd: PingCommand) -> JoinHandle<SamplingReport> {
        let sampler = self.clone();
        tokio::spawn(async move { sampler.run(&cmd).await })
    }

    /// Takes exactly `cmd.duration_seconds` samples, sleeping the flat
    /// interval after each attempt.
    pub async fn run(&self, cmd: &PingCommand) -> SamplingReport {
        let topic = result_topic(&cmd.session_id);
        let mut report = SamplingReport::default();
        let mut last_timestamp = None;

        for attempt in 1..=cmd.duration_seconds {
            let outcome = self.probe.measure(&cmd.target_url).await;
            let timestamp = next_timestamp(last_timestamp);
            last_timestamp = Some(timestamp);

            let result = self.sample(cmd, timestamp, outcome);
            report.attempts += 1;
            if !result.success {
                report.failures += 1;
            }
            debug!(
                "[{}] {} attempt {attempt}/{}: success={} total={}ms",
                self.worker_id,
                cmd.session_id,
                cmd.duration_seconds,
                result.success,
                result.metrics.total_ms
            );

            if let Err(e) = self.publish(&topic, &result).await {
                report.publish_errors += 1;
                warn!("[{}] dropping sample for {topic}: {e}", self.worker_id);
            }

            tokio::time::sleep(self.interval).await;
        }

        info!(
            "[{}] finished {}: {} samples, {} failed",
            self.worker_id, cmd.session_id, report.attempts, report.failures
        );
        report
    }

    fn sample(
        &self,
        cmd: &PingCommand,
        timestamp: DateTime<Utc>,
        outcome: Result<Metrics, ProbeFailure>,
    ) -> PingResult {
        let (metrics, error) = match outcome {
            Ok(metrics) => (metrics, None),
            Err(failure) => (failure.metrics, Some(failure.error.to_string())),
        };
        PingResult {
            session_id: cmd.session_id.clone(),
            worker_id: self.worker_id.clone(),
            timestamp,
            success: error.is_none(),
            metrics,
            error,
        }
    }

    async fn publish(&self, topic: &str, result: &PingResult) -> Result<(), BusError> {
        let payload = serde_json::to_string(result)?;
        self.bus.publish(topic, payload).await
    }
}

/// Current time, nudged forward when the clock has not advanced past the
/// previous sample.
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + chrono::Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod timestamp_tests {
    use super::next_timestamp;
    use chrono::{Duration, Utc};

    #[test]
    fn later_than_a_future_previous_timestamp() {
        let future = Utc::now() + Duration::seconds(60);
        assert!(next_timestamp(Some(future)) > future);
    }

    #[test]
    fn uses_wall_clock_when_it_moved_on() {
        let past = Utc::now() - Duration::seconds(60);
        let next = next_timestamp(Some(past));
        assert!(next - past > Duration::seconds(59));
    }
}
