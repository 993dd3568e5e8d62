use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub worker: WorkerSettings,
    pub ping: PingSettings,
    pub log: LogSettings,
}

/// Where the HTTP API listens.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Where the embedded WebSocket broker listens, and how much it buffers per
/// connection.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_buffer: usize,
}

/// Identity of a worker process and the broker it connects to.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub name: String,
    pub broker_url: String,
}

/// Timing knobs of a measurement session.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PingSettings {
    /// Samples per session when the request does not override it.
    pub duration_secs: u32,
    /// Largest duration override a request may ask for.
    pub max_duration_secs: u32,
    pub attempt_timeout_ms: u64,
    pub sample_interval_ms: u64,
    pub stream_deadline_secs: u64,
    /// Capacity of a session's result subscription.
    pub result_buffer: usize,
}

impl PingSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn stream_deadline(&self) -> Duration {
        Duration::from_secs(self.stream_deadline_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from [`Settings::default`].
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub worker: Option<PartialWorkerSettings>,
    pub ping: Option<PartialPingSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_buffer: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialWorkerSettings {
    pub name: Option<String>,
    pub broker_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPingSettings {
    pub duration_secs: Option<u32>,
    pub max_duration_secs: Option<u32>,
    pub attempt_timeout_ms: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub stream_deadline_secs: Option<u64>,
    pub result_buffer: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Overlays the values that were provided on top of `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let worker = self.worker.unwrap_or_default();
        let ping = self.ping.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                host: broker.host.unwrap_or(default.broker.host),
                port: broker.port.unwrap_or(default.broker.port),
                client_buffer: broker.client_buffer.unwrap_or(default.broker.client_buffer),
            },
            worker: WorkerSettings {
                name: worker.name.unwrap_or(default.worker.name),
                broker_url: worker.broker_url.unwrap_or(default.worker.broker_url),
            },
            ping: PingSettings {
                duration_secs: ping.duration_secs.unwrap_or(default.ping.duration_secs),
                max_duration_secs: ping
                    .max_duration_secs
                    .unwrap_or(default.ping.max_duration_secs),
                attempt_timeout_ms: ping
                    .attempt_timeout_ms
                    .unwrap_or(default.ping.attempt_timeout_ms),
                sample_interval_ms: ping
                    .sample_interval_ms
                    .unwrap_or(default.ping.sample_interval_ms),
                stream_deadline_secs: ping
                    .stream_deadline_secs
                    .unwrap_or(default.ping.stream_deadline_secs),
                result_buffer: ping.result_buffer.unwrap_or(default.ping.result_buffer),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                host: "127.0.0.1".to_string(),
                port: 4222,
                client_buffer: 1024,
            },
            worker: WorkerSettings {
                name: "local-worker".to_string(),
                broker_url: "ws://127.0.0.1:4222".to_string(),
            },
            ping: PingSettings {
                duration_secs: 15,
                max_duration_secs: 300,
                attempt_timeout_ms: 5000,
                sample_interval_ms: 1000,
                stream_deadline_secs: 15,
                result_buffer: 100,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
