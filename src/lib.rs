//! # PingPong
//!
//! `pingpong` measures HTTP latency to a target URL from one or more worker
//! processes and streams every sample back to the requester as it happens.
//!
//! A request enters through the HTTP API, which broadcasts a start command on
//! a publish/subscribe bus. Every listening worker probes the target once per
//! interval and publishes each sample on the session's result topic. The API
//! relays those samples to the requester over Server-Sent Events and closes
//! the stream with a completion event when the session deadline passes.
//!
//! ## Core Modules
//!
//! - `api`: the HTTP surface (`/api/stream`, `/healthz`).
//! - `broker`: the in-memory topic registry and fan-out engine.
//! - `bus`: the publish/subscribe capability and its in-process implementation.
//! - `client`: one subscriber endpoint registered with the broker.
//! - `config`: layered configuration loading.
//! - `ping`: the probe, sampling loop, worker, dispatcher and stream aggregator.
//! - `transport`: the WebSocket broker server and the matching remote bus.
//! - `utils`: shared errors and logging setup.

pub mod api;
pub mod broker;
pub mod bus;
pub mod client;
pub mod config;
pub mod ping;
pub mod transport;
pub mod utils;
