//! Resolves the scan target into an IP address.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    TokioAsyncResolver,
};
use log::debug;
use tokio::{fs, io};

/// Resolves `host` once so the probes don't each hit DNS.
///
/// IP literals are returned as-is. Hostnames go through the system resolver
/// first and then through a backup resolver. IPv4 answers are preferred, so
/// `localhost` maps to `127.0.0.1` where both families exist. Returns `None`
/// when nothing resolves; the caller then lets each probe report the failure
/// for its own port.
///
/// ```rust
/// # use bannerscan::address::resolve_host;
/// # use std::net::{IpAddr, Ipv4Addr};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ip = resolve_host("127.0.0.1", None).await;
/// assert_eq!(ip, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
/// # }
/// ```
pub async fn resolve_host(host: &str, resolver: Option<&str>) -> Option<IpAddr> {
    if let Ok(ip) = IpAddr::from_str(host) {
        return Some(ip);
    }

    if let Ok(addrs) = tokio::net::lookup_host((host, 80)).await {
        if let Some(ip) = addrs.map(|addr| addr.ip()).min_by_key(IpAddr::is_ipv6) {
            debug!("System resolver mapped {host} to {ip}");
            return Some(ip);
        }
    }

    let backup_resolver = get_resolver(resolver).await;
    match backup_resolver.lookup_ip(host).await {
        Ok(lookup) => {
            let ip = lookup.iter().min_by_key(IpAddr::is_ipv6);
            debug!("Backup resolver mapped {host} to {ip:?}");
            ip
        }
        Err(e) => {
            debug!("Host {host:?} could not be resolved: {e}");
            None
        }
    }
}

/// Derive a DNS resolver.
///
/// 1. if the `resolver` parameter has been set:
///     1. assume the parameter is a path and attempt to read IPs.
///     2. parse the input as a comma-separated list of IPs.
/// 2. if `resolver` is not set:
///    1. attempt to derive a resolver from the system config. (e.g.
///       `/etc/resolv.conf` on *nix).
///    2. finally, build a CloudFlare-based resolver (default
///       behaviour).
async fn get_resolver(resolver: Option<&str>) -> TokioAsyncResolver {
    match resolver {
        Some(r) => {
            let mut config = ResolverConfig::new();
            let resolver_ips = match read_resolver_from_file(r).await {
                Ok(ips) => ips,
                Err(_) => parse_resolver_list(r),
            };
            for ip in resolver_ips {
                config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(ip, 53),
                    Protocol::Udp,
                ));
            }
            TokioAsyncResolver::tokio(config, ResolverOpts::default())
        }
        None => TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            TokioAsyncResolver::tokio(ResolverConfig::cloudflare_tls(), ResolverOpts::default())
        }),
    }
}

fn parse_resolver_list(list: &str) -> Vec<IpAddr> {
    list.split(',')
        .filter_map(|r| IpAddr::from_str(r.trim()).ok())
        .collect()
}

/// Parses and input file of IPs for use in DNS resolution.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}
