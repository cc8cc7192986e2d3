use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::future::Future;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::models::{CheckKind, Target};

const PING_DEADLINE: Duration = Duration::from_secs(2);
const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub latency_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn up(latency: Duration) -> Self {
        Self {
            reachable: true,
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
        }
    }

    pub fn down() -> Self {
        Self {
            reachable: false,
            latency_ms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("host is not set")]
    MissingHost,
    #[error("no url or host to probe")]
    MissingUrl,
    #[error("dns lookup failed: {0}")]
    Dns(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("probe timed out")]
    Timeout,
}

/// A probe never propagates transport failures past this boundary: diagnosable
/// failures come back as `ProbeError`, clean unreachable verdicts as
/// `Ok(ProbeOutcome::down())`. The engine maps both to an offline result.
pub trait Prober: Send + Sync {
    fn probe(&self, target: &Target) -> impl Future<Output = Result<ProbeOutcome, ProbeError>> + Send;
}

pub struct NetProber {
    ping: PingClient,
    http: reqwest::Client,
    resolver: TokioResolver,
    budget: Duration,
}

impl NetProber {
    pub fn new(budget: Duration) -> anyhow::Result<Self> {
        let ping = PingClient::new(&PingConfig::default())?;

        // Certificate validation is off: this probes reachability, not trust.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(budget)
            .build()?;

        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();

        Ok(Self {
            ping,
            http,
            resolver,
            budget,
        })
    }

    async fn dispatch(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        match target.kind {
            CheckKind::Ping => self.check_ping(target).await,
            CheckKind::Http | CheckKind::Https => self.check_http(target).await,
            CheckKind::Ssh => self.check_ssh(target).await,
        }
    }

    async fn check_ping(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        let host = required_host(target)?;
        let ip = self.resolve(host).await?;

        let payload = [0u8; 56];
        let mut pinger = self.ping.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(PING_DEADLINE);

        match pinger.ping(PingSequence(0), &payload).await {
            Ok((_, latency)) => Ok(ProbeOutcome::up(latency)),
            Err(_) => Ok(ProbeOutcome::down()),
        }
    }

    async fn check_http(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        let url = target_url(target)?;
        let started = Instant::now();
        let response = self.http.get(&url).send().await?;
        let latency = started.elapsed();

        // 1xx..4xx means the server answered; only 5xx counts as down.
        if response.status().as_u16() < 500 {
            Ok(ProbeOutcome::up(latency))
        } else {
            Ok(ProbeOutcome::down())
        }
    }

    async fn check_ssh(&self, target: &Target) -> Result<ProbeOutcome, ProbeError> {
        let host = required_host(target)?;
        let addr = format!("{}:{}", host, target.port.unwrap_or(DEFAULT_SSH_PORT));
        let started = Instant::now();

        match tokio::time::timeout(self.budget, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => Ok(ProbeOutcome::up(started.elapsed())),
            Ok(Err(_)) | Err(_) => Ok(ProbeOutcome::down()),
        }
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .ok_or_else(|| ProbeError::Dns(format!("no address found for {host}"))),
            Err(e) => Err(ProbeError::Dns(e.to_string())),
        }
    }
}

impl Prober for NetProber {
    fn probe(&self, target: &Target) -> impl Future<Output = Result<ProbeOutcome, ProbeError>> + Send {
        async move {
            match tokio::time::timeout(self.budget, self.dispatch(target)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout),
            }
        }
    }
}

fn required_host(target: &Target) -> Result<&str, ProbeError> {
    target
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or(ProbeError::MissingHost)
}

/// A target with an explicit `url` is probed there; otherwise the URL is
/// synthesized as `{scheme}://{host}[:{port}]`.
pub(crate) fn target_url(target: &Target) -> Result<String, ProbeError> {
    if let Some(url) = target.url.as_deref().filter(|u| !u.is_empty()) {
        return Ok(url.to_string());
    }

    let host = target
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or(ProbeError::MissingUrl)?;
    let scheme = match target.kind {
        CheckKind::Https => "https",
        _ => "http",
    };

    Ok(match target.port {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}
