//! Timing probe
//!
//! One instrumented HTTP `HEAD` round trip per call. The probe opens its own
//! TCP (and TLS) connection every time so that DNS, connect and handshake
//! costs are paid, and records each phase at these hook points, all
//! relative to the start of the attempt:
//!
//! - `dns_ms`: resolver call start → addresses returned (skipped for IP
//!   literals)
//! - `connect_ms`: first TCP connect attempt → socket established
//! - `tls_ms`: handshake start → handshake finished (`https` only)
//! - `ttfb_ms`: attempt start → response head received
//! - `total_ms`: attempt start → response body drained, failure, or timeout
//!
//! A failed attempt still reports the phases reached before the fault.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONNECTION, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, lookup_host};
use tokio::task::JoinHandle;
use tokio_native_tls::TlsConnector;
use tracing::debug;
use url::{Host, Position, Url};

use crate::ping::model::Metrics;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target url: {0}")]
    InvalidUrl(String),

    #[error("dns lookup for {host} failed: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dns lookup for {0} returned no addresses")]
    NoAddress(String),

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: native_tls::Error,
    },

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("http exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A failed attempt: the error plus whatever was measured before it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProbeFailure {
    pub metrics: Metrics,
    #[source]
    pub error: ProbeError,
}

impl ProbeFailure {
    pub fn new(metrics: Metrics, error: ProbeError) -> Self {
        Self { metrics, error }
    }
}

/// One network attempt against a target. Implementations must not retry.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn measure(&self, target: &str) -> Result<Metrics, ProbeFailure>;
}

#[derive(Clone)]
pub struct TimingProbe {
    timeout: Duration,
    tls: TlsConnector,
}

impl TimingProbe {
    pub fn new(timeout: Duration) -> Result<Self, native_tls::Error> {
        let tls = native_tls::TlsConnector::new()?;
        Ok(Self {
            timeout,
            tls: TlsConnector::from(tls),
        })
    }

    async fn round_trip(
        &self,
        endpoint: &Endpoint,
        start: Instant,
        metrics: &mut Metrics,
    ) -> Result<(), ProbeError> {
        let addrs = resolve(endpoint, metrics).await?;
        let tcp = connect(endpoint, &addrs, metrics).await?;

        if !endpoint.secure {
            return exchange(tcp, endpoint, start, metrics).await;
        }

        let tls_start = Instant::now();
        let handshake = self.tls.connect(&endpoint.host, tcp).await;
        metrics.tls_ms = elapsed_ms(tls_start);
        let tls = handshake.map_err(|source| ProbeError::Tls {
            host: endpoint.host.clone(),
            source,
        })?;
        exchange(tls, endpoint, start, metrics).await
    }
}

impl std::fmt::Debug for TimingProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingProbe")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Probe for TimingProbe {
    async fn measure(&self, target: &str) -> Result<Metrics, ProbeFailure> {
        let endpoint = Endpoint::parse(target)
            .map_err(|error| ProbeFailure::new(Metrics::default(), error))?;

        let mut metrics = Metrics::default();
        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.timeout, self.round_trip(&endpoint, start, &mut metrics))
                .await;
        metrics.total_ms = elapsed_ms(start);

        match outcome {
            Ok(Ok(())) => Ok(metrics),
            Ok(Err(error)) => Err(ProbeFailure::new(metrics, error)),
            Err(_) => Err(ProbeFailure::new(
                metrics,
                ProbeError::Timeout(self.timeout),
            )),
        }
    }
}

/// The parts of a target URL the probe needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    /// Host name or IP text, without IPv6 brackets.
    host: String,
    ip: Option<IpAddr>,
    port: u16,
    secure: bool,
    /// `Host` header value.
    authority: String,
    /// Request target, path plus query.
    path: String,
}

impl Endpoint {
    fn parse(target: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(target.trim())
            .map_err(|e| ProbeError::InvalidUrl(format!("{target}: {e}")))?;

        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(ProbeError::InvalidUrl(format!(
                    "{target}: unsupported scheme {other}"
                )));
            }
        };
        let (host, ip) = match url.host() {
            Some(Host::Domain(domain)) => (domain.to_string(), None),
            Some(Host::Ipv4(ip)) => (ip.to_string(), Some(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => (ip.to_string(), Some(IpAddr::V6(ip))),
            None => return Err(ProbeError::InvalidUrl(format!("{target}: missing host"))),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ProbeError::InvalidUrl(format!("{target}: missing port")))?;

        Ok(Self {
            host,
            ip,
            port,
            secure,
            authority: url[Position::BeforeHost..Position::AfterPort].to_string(),
            path: url[Position::BeforePath..Position::AfterQuery].to_string(),
        })
    }
}

async fn resolve(endpoint: &Endpoint, metrics: &mut Metrics) -> Result<Vec<SocketAddr>, ProbeError> {
    if let Some(ip) = endpoint.ip {
        return Ok(vec![SocketAddr::new(ip, endpoint.port)]);
    }

    let dns_start = Instant::now();
    let lookup = lookup_host((endpoint.host.as_str(), endpoint.port)).await;
    metrics.dns_ms = elapsed_ms(dns_start);

    let addrs: Vec<SocketAddr> = lookup
        .map_err(|source| ProbeError::Dns {
            host: endpoint.host.clone(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ProbeError::NoAddress(endpoint.host.clone()));
    }
    Ok(addrs)
}

/// Tries each resolved address in order until one accepts.
async fn connect(
    endpoint: &Endpoint,
    addrs: &[SocketAddr],
    metrics: &mut Metrics,
) -> Result<TcpStream, ProbeError> {
    let connect_start = Instant::now();
    let mut last_error = None;

    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                metrics.connect_ms = elapsed_ms(connect_start);
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(source) => {
                debug!("connect to {addr} failed: {source}");
                last_error = Some(ProbeError::Connect {
                    addr: *addr,
                    source,
                });
            }
        }
    }

    metrics.connect_ms = elapsed_ms(connect_start);
    Err(last_error.unwrap_or_else(|| ProbeError::NoAddress(endpoint.host.clone())))
}

async fn exchange<S>(
    io: S,
    endpoint: &Endpoint,
    start: Instant,
    metrics: &mut Metrics,
) -> Result<(), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;
    let _driver = AbortOnDrop(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("probe connection ended: {e}");
        }
    }));

    let request = Request::builder()
        .method(Method::HEAD)
        .uri(endpoint.path.as_str())
        .header(HOST, endpoint.authority.as_str())
        .header(CONNECTION, "close")
        .header(USER_AGENT, concat!("pingpong/", env!("CARGO_PKG_VERSION")))
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    metrics.ttfb_ms = elapsed_ms(start);
    debug!("{} answered {}", endpoint.authority, response.status());

    response.into_body().collect().await?;
    Ok(())
}

/// Stops the connection driver when the attempt ends, including when the
/// attempt is cancelled by the timeout.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
