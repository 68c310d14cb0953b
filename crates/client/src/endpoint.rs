//! Local endpoint discovery and host identity.
//!
//! The registry needs a dialable URL per address family, a stable machine
//! identifier and a capacity hint. All three come from a [`HostProbe`] so the
//! lease manager can be driven without touching real interfaces.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// IP address family of a resolved address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("IPv4"),
            Self::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// First non-loopback address seen for each family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicEndpoints {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl PublicEndpoints {
    /// Keeps the first non-loopback address per family, in encounter order.
    pub fn from_addrs<I>(addrs: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let mut found = Self::default();
        for addr in addrs {
            if addr.is_loopback() {
                continue;
            }
            match addr {
                IpAddr::V4(v4) if found.ipv4.is_none() => found.ipv4 = Some(v4),
                IpAddr::V6(v6) if found.ipv6.is_none() => found.ipv6 = Some(v6),
                _ => {}
            }
            if found.ipv4.is_some() && found.ipv6.is_some() {
                break;
            }
        }
        found
    }
}

/// Builds `protocol + host + ":" + port`. IPv6 hosts are bracketed.
pub fn format_address(protocol: &str, ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{protocol}{v4}:{port}"),
        IpAddr::V6(v6) => format!("{protocol}[{v6}]:{port}"),
    }
}

/// Completes a bare scheme such as `https` to `https://`.
pub fn normalize_protocol(protocol: &str) -> String {
    if protocol.ends_with("://") {
        protocol.to_string()
    } else {
        format!("{}://", protocol.trim_end_matches(':'))
    }
}

/// Source of local host facts sent with a registration.
pub trait HostProbe: Send + Sync {
    fn public_endpoints(&self) -> PublicEndpoints;

    fn machine_id(&self) -> String;

    /// Available memory in bytes, sampled at call time.
    fn available_memory(&self) -> u64;
}

/// [`HostProbe`] backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostProbe for SystemHost {
    fn public_endpoints(&self) -> PublicEndpoints {
        let interfaces = match local_ip_address::list_afinet_netifas() {
            Ok(ifs) => ifs,
            Err(e) => {
                debug!(error = %e, "Failed to list network interfaces");
                return PublicEndpoints::default();
            }
        };

        let endpoints = PublicEndpoints::from_addrs(interfaces.into_iter().map(|(_, ip)| ip));
        debug!(ipv4 = ?endpoints.ipv4, ipv6 = ?endpoints.ipv6, "Discovered public endpoints");
        endpoints
    }

    fn machine_id(&self) -> String {
        if let Ok(content) = std::fs::read_to_string("/etc/machine-id") {
            let id = content.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }

        hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn available_memory(&self) -> u64 {
        available_memory_bytes()
    }
}

#[cfg(target_os = "linux")]
fn available_memory_bytes() -> u64 {
    match std::fs::read_to_string("/proc/meminfo") {
        Ok(meminfo) => parse_mem_available(&meminfo).unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(not(target_os = "linux"))]
fn available_memory_bytes() -> u64 {
    0
}

/// Reads `MemAvailable` (kB) out of a `/proc/meminfo` dump, in bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("MemAvailable:"), Some(kb)) => kb.parse::<u64>().ok().map(|kb| kb * 1024),
            _ => None,
        }
    })
}
