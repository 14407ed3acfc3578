//! Outbound address policy for the website fetcher

use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::debug;

use super::ToolError;

/// Host name to addresses
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// The operating system resolver
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        Ok(tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect())
    }
}

/// Blocked networks and host suffixes.
///
/// The default table rejects loopback, link-local, private and
/// unspecified ranges plus local-only DNS suffixes. The policy is also the
/// fetch client's DNS resolver, so the addresses a request connects to are
/// the ones that passed the table.
#[derive(Clone)]
pub struct AddressPolicy {
    blocked_v4: Vec<(Ipv4Addr, u8)>,
    blocked_v6: Vec<(Ipv6Addr, u8)>,
    blocked_suffixes: Vec<String>,
    allowed_schemes: Vec<String>,
    lookup: Arc<dyn HostLookup>,
}

impl fmt::Debug for AddressPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressPolicy")
            .field("blocked_v4", &self.blocked_v4)
            .field("blocked_v6", &self.blocked_v6)
            .field("blocked_suffixes", &self.blocked_suffixes)
            .field("allowed_schemes", &self.allowed_schemes)
            .finish_non_exhaustive()
    }
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            blocked_v4: vec![
                (Ipv4Addr::new(0, 0, 0, 0), 8),
                (Ipv4Addr::new(10, 0, 0, 0), 8),
                (Ipv4Addr::new(127, 0, 0, 0), 8),
                (Ipv4Addr::new(169, 254, 0, 0), 16),
                (Ipv4Addr::new(172, 16, 0, 0), 12),
                (Ipv4Addr::new(192, 168, 0, 0), 16),
            ],
            blocked_v6: vec![
                (Ipv6Addr::LOCALHOST, 128),
                (Ipv6Addr::UNSPECIFIED, 128),
                (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
                (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
            ],
            blocked_suffixes: vec![
                "localhost".to_string(),
                ".local".to_string(),
                ".internal".to_string(),
                ".localhost".to_string(),
            ],
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            lookup: Arc::new(SystemLookup),
        }
    }
}

fn v4_in(addr: Ipv4Addr, (network, prefix): (Ipv4Addr, u8)) -> bool {
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
    u32::from(addr) & mask == u32::from(network) & mask
}

fn v6_in(addr: Ipv6Addr, (network, prefix): (Ipv6Addr, u8)) -> bool {
    let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - u32::from(prefix)) };
    u128::from(addr) & mask == u128::from(network) & mask
}

impl AddressPolicy {
    pub fn new(
        blocked_v4: Vec<(Ipv4Addr, u8)>,
        blocked_v6: Vec<(Ipv6Addr, u8)>,
        blocked_suffixes: Vec<String>,
    ) -> Self {
        Self {
            blocked_v4,
            blocked_v6,
            blocked_suffixes,
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            lookup: Arc::new(SystemLookup),
        }
    }

    /// Resolve host names through `lookup` instead of the system resolver
    pub fn with_lookup(mut self, lookup: Arc<dyn HostLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Nothing blocked beyond the scheme check
    pub fn permissive() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn is_blocked_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.blocked_v4.iter().any(|net| v4_in(v4, *net)),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.is_blocked_ip(IpAddr::V4(v4)),
                None => self.blocked_v6.iter().any(|net| v6_in(v6, *net)),
            },
        }
    }

    pub fn is_blocked_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.blocked_suffixes.iter().any(|suffix| {
            if suffix.starts_with('.') {
                host.ends_with(suffix.as_str())
            } else {
                host == *suffix || host.ends_with(&format!(".{}", suffix))
            }
        })
    }

    /// Parse `raw`, check its scheme and host, and resolve the host to make
    /// sure no address it points at is blocked
    pub async fn check_url(&self, raw: &str) -> Result<reqwest::Url, ToolError> {
        let url = reqwest::Url::parse(raw.trim())
            .map_err(|e| ToolError::Execution(format!("Invalid URL '{}': {}", raw, e)))?;

        if !self.allowed_schemes.iter().any(|s| s == url.scheme()) {
            return Err(ToolError::Execution(format!(
                "Unsupported URL scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ToolError::Execution(format!("URL '{}' has no host", raw)))?;
        let bare = host.trim_start_matches('[').trim_end_matches(']');

        if self.is_blocked_host(bare) {
            return Err(blocked(host));
        }

        if let Ok(ip) = bare.parse::<IpAddr>() {
            if self.is_blocked_ip(ip) {
                return Err(blocked(host));
            }
            return Ok(url);
        }

        self.resolve_host(bare).await?;
        Ok(url)
    }

    /// Look up `host` and fail if it resolves to nothing or to any blocked
    /// address
    pub async fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, ToolError> {
        if self.is_blocked_host(host) {
            return Err(blocked(host));
        }

        let addrs = self
            .lookup
            .lookup(host)
            .await
            .map_err(|e| ToolError::Execution(format!("Could not resolve {}: {}", host, e)))?;
        if addrs.is_empty() {
            return Err(ToolError::Execution(format!("Could not resolve {}", host)));
        }
        if let Some(addr) = addrs.iter().find(|ip| self.is_blocked_ip(**ip)) {
            debug!("{} resolves to blocked address {}", host, addr);
            return Err(blocked(host));
        }

        Ok(addrs)
    }
}

impl Resolve for AddressPolicy {
    fn resolve(&self, name: Name) -> Resolving {
        let policy = self.clone();
        Box::pin(async move {
            let ips = policy.resolve_host(name.as_str()).await?;
            let addrs: Addrs = Box::new(ips.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

fn blocked(host: &str) -> ToolError {
    ToolError::Execution(format!(
        "Refusing to fetch {}: private or local addresses are not allowed",
        host
    ))
}
