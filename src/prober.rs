use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::CheckType;
use crate::error::{MonitorError, Result};
use crate::models::{Endpoint, ProbeResult};

/// Ports tried when a host ignores ICMP echo.
const DISCOVERY_PORTS: &[(u16, &str)] = &[
    (22, "SSH"), (3389, "RDP"), (80, "HTTP"), (443, "HTTPS"),
    (3306, "MySQL"), (8080, "Web-Alt"), (5900, "VNC"),
];
const DISCOVERY_TIMEOUT: Duration = Duration::from_millis(1200);

/// A single reachability check. Implementations never retry and never panic;
/// every failure is folded into the returned `ProbeResult`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult;
}

pub fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

pub struct NetworkProber {
    ping_v4: PingClient,
    ping_v6: Option<PingClient>,
    dns_resolver: TokioResolver,
}

impl NetworkProber {
    pub fn new() -> Result<Self> {
        let ping_v4 = PingClient::new(&PingConfig::default())
            .map_err(|e| MonitorError::Probe(format!("failed to create ICMP client: {}", e)))?;
        // IPv6 sockets are optional; hosts without v6 still probe v4 targets.
        let ping_v6 = PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()).ok();

        let dns_resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();

        info!("DNS resolver configured: Cloudflare 1.1.1.1 / 1.0.0.1");

        Ok(Self { ping_v4, ping_v6, dns_resolver })
    }

    async fn check_ping(&self, ip: IpAddr, timeout: Duration) -> ProbeResult {
        let client = match (ip, &self.ping_v6) {
            (IpAddr::V4(_), _) => &self.ping_v4,
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => {
                return ProbeResult::ProbeError {
                    message: "IPv6 ICMP is not available on this host".into(),
                }
            }
        };

        let payload = [0u8; 56];
        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(0), &payload).await {
            Ok((_, latency)) => ProbeResult::Reachable { latency_ms: round_ms(latency) },
            Err(SurgeError::Timeout { .. }) => match discover_tcp(ip).await {
                Some(result) => result,
                None => ProbeResult::Unreachable,
            },
            Err(e) => ProbeResult::ProbeError { message: e.to_string() },
        }
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult {
        let ip = match resolve_within(&self.dns_resolver, &endpoint.address, timeout).await {
            Ok(ip) => ip,
            Err(message) => return ProbeResult::ProbeError { message },
        };

        match endpoint.check {
            CheckType::Ping => self.check_ping(ip, timeout).await,
            CheckType::TcpPort { port } => tcp_connect(SocketAddr::new(ip, port), timeout).await,
        }
    }
}

/// Name lookup bounded by the check timeout. IP literals skip DNS.
async fn resolve_within(
    resolver: &TokioResolver,
    address: &str,
    timeout: Duration,
) -> std::result::Result<IpAddr, String> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    match tokio::time::timeout(timeout, resolver.lookup_ip(address)).await {
        Ok(Ok(lookup)) => lookup.iter().next().ok_or_else(|| "no IP address found".into()),
        Ok(Err(e)) => Err(format!("DNS resolution failed: {}", e)),
        Err(_) => Err("DNS resolution timed out".into()),
    }
}

/// TCP handshake check. Refused and timed-out connections are both unreachable.
pub async fn tcp_connect(addr: SocketAddr, timeout: Duration) -> ProbeResult {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => ProbeResult::Reachable { latency_ms: round_ms(start.elapsed()) },
        Ok(Err(e)) => {
            debug!("TCP connect to {} failed: {}", addr, e);
            ProbeResult::Unreachable
        }
        Err(_) => ProbeResult::Unreachable,
    }
}

/// ICMP-filtered hosts are still up if any common service port answers.
async fn discover_tcp(ip: IpAddr) -> Option<ProbeResult> {
    let mut discovery_tasks = FuturesUnordered::new();
    for &(port, name) in DISCOVERY_PORTS {
        discovery_tasks.push(async move {
            (tcp_connect(SocketAddr::new(ip, port), DISCOVERY_TIMEOUT).await, name)
        });
    }

    while let Some((result, name)) = discovery_tasks.next().await {
        if result.is_up() {
            debug!("{} is ICMP filtered, verified via {}", ip, name);
            return Some(result);
        }
    }
    None
}
