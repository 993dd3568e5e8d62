//! Wire types of the ping protocol.
//!
//! All of them travel as camelCase JSON: [`PingCommand`] on `ping.start`,
//! [`PingResult`] on `ping.result.<sessionId>`, and [`StreamEvent`] on the
//! requester-facing event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Start command broadcast to every worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingCommand {
    pub session_id: String,
    pub target_url: String,
    pub duration_seconds: u32,
}

/// Phase timings of one HTTP round trip, in whole milliseconds.
///
/// Each phase is measured between its own hook points; the phases are not
/// expected to add up to `total_ms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub dns_ms: u64,
    #[serde(rename = "tcpMs", alias = "connectMs")]
    pub connect_ms: u64,
    pub tls_ms: u64,
    pub ttfb_ms: u64,
    pub total_ms: u64,
}

/// One sample reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub session_id: String,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub metrics: Metrics,
    /// Set only when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Terminal status values of a result stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Completed,
}

/// `{"status": "completed"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: StreamStatus,
}

/// One event of the requester-facing stream.
///
/// The two shapes are told apart structurally on the wire: a sample carries
/// `sessionId` and `metrics`, the completion object only `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Sample(PingResult),
    Status(StatusUpdate),
}

impl StreamEvent {
    pub fn completed() -> Self {
        StreamEvent::Status(StatusUpdate {
            status: StreamStatus::Completed,
        })
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            StreamEvent::Status(StatusUpdate {
                status: StreamStatus::Completed
            })
        )
    }

    pub fn as_sample(&self) -> Option<&PingResult> {
        match self {
            StreamEvent::Sample(result) => Some(result),
            StreamEvent::Status(_) => None,
        }
    }
}
