//! Trusted-IP bypass and IP list matching.

use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::str::FromStr;

/// Errors raised while parsing configured IP lists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpParseError {
    #[error("Invalid IP address or CIDR range: '{0}'")]
    Invalid(String),
}

/// A single IP list entry: a literal address (stored as a host network) or a CIDR
/// range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMatcher(IpNetwork);

impl IpMatcher {
    pub fn network(&self) -> IpNetwork {
        self.0
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(ip.to_canonical())
    }
}

impl FromStr for IpMatcher {
    type Err = IpParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || IpParseError::Invalid(s.to_string());

        if s.contains('/') {
            return s.parse::<IpNetwork>().map(Self).map_err(|_| invalid());
        }
        // Literal IPv4-mapped IPv6 entries match the plain IPv4 client.
        s.parse::<IpAddr>()
            .map(|ip| Self(IpNetwork::from(ip.to_canonical())))
            .map_err(|_| invalid())
    }
}

/// Ordered set of [`IpMatcher`]s, read-only after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpList(Vec<IpMatcher>);

impl IpList {
    pub fn new(entries: Vec<IpMatcher>) -> Self {
        Self(entries)
    }

    /// Parses a comma-separated list, ignoring blank entries.
    ///
    /// # Errors
    ///
    /// Returns [`IpParseError::Invalid`] for the first malformed entry.
    pub fn parse(raw: &str) -> Result<Self, IpParseError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(IpMatcher::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|m| m.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decides which clients skip rate limiting entirely.
///
/// Trusted: the configured allowlist, loopback, and the IPv4 private ranges
/// 10.0.0.0/8, 172.16.0.0/12 and 192.168.0.0/16.
#[derive(Debug, Clone, Default)]
pub struct BypassPolicy {
    allowlist: IpList,
}

impl BypassPolicy {
    pub fn new(allowlist: IpList) -> Self {
        Self { allowlist }
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        if ip.is_loopback() || self.allowlist.contains(ip) {
            return true;
        }
        match ip {
            IpAddr::V4(v4) => v4.is_private(),
            IpAddr::V6(_) => false,
        }
    }
}
