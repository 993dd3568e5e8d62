//! The probe-and-correlate core.
//!
//! - [`probe`]: one instrumented HTTP round trip
//! - [`sampler`]: the per-session sampling loop and result publisher
//! - [`worker`]: turns start commands into sampling loops
//! - [`dispatch`]: validates requests and broadcasts start commands
//! - [`aggregator`]: relays a session's results to its requester
//! - [`model`]: the wire types shared by all of the above

pub mod aggregator;
pub mod dispatch;
pub mod model;
pub mod probe;
pub mod sampler;
pub mod worker;

pub use aggregator::{SessionStream, StreamAggregator, StreamState};
pub use dispatch::{Dispatcher, MeasurementRequest};
pub use model::{Metrics, PingCommand, PingResult, StreamEvent};
pub use probe::{Probe, ProbeError, ProbeFailure, TimingProbe};
pub use sampler::{Sampler, SamplingReport};
pub use worker::Worker;

#[cfg(test)]
mod probe_tests;
