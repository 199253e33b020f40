// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Server discovery
//
// A server is anything on the PicMover port that answers /ping with its
// name. Candidates are probed concurrently with a short timeout.

use crate::client::PeerClient;
use crate::types::{AppError, ClientSettings, PeerMeta};
use futures::future::join_all;
use std::net::{IpAddr, Ipv4Addr};

/// Ask one host whether it runs a PicMover server
pub async fn probe_peer(host: &str, settings: &ClientSettings) -> Result<PeerMeta, AppError> {
    let client = PeerClient::with_timeout(host, settings.port, settings.ping_timeout())?;
    let name = client.ping().await?;
    tracing::info!("Found server {:?} at {}", name, host);
    Ok(PeerMeta::new(host, name))
}

/// Probe every candidate, returning the servers found in candidate order
pub async fn scan(hosts: &[String], settings: &ClientSettings) -> Vec<PeerMeta> {
    let probes = hosts.iter().map(|host| probe_peer(host, settings));

    join_all(probes)
        .await
        .into_iter()
        .zip(hosts)
        .filter_map(|(result, host)| match result {
            Ok(peer) => Some(peer),
            Err(e) => {
                tracing::debug!("No server at {}: {}", host, e);
                None
            }
        })
        .collect()
}

/// Loopback plus every other host of the local /24
pub fn lan_candidates() -> Vec<String> {
    let mut hosts = vec![Ipv4Addr::LOCALHOST.to_string()];

    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(local)) => hosts.extend(subnet_hosts(local)),
        Ok(IpAddr::V6(_)) => tracing::warn!("IPv6 local address, scanning loopback only"),
        Err(e) => tracing::warn!("Could not determine local IP: {}", e),
    }

    hosts
}

/// Hosts .1 to .254 of `local`'s /24, excluding `local` itself
pub fn subnet_hosts(local: Ipv4Addr) -> Vec<String> {
    let [a, b, c, own] = local.octets();
    (1..=254u8)
        .filter(|&d| d != own)
        .map(|d| Ipv4Addr::new(a, b, c, d).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_hosts_skip_self() {
        let hosts = subnet_hosts(Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(hosts.len(), 253);
        assert_eq!(hosts[0], "192.168.1.1");
        assert_eq!(hosts.last().unwrap(), "192.168.1.254");
        assert!(!hosts.contains(&"192.168.1.20".to_string()));
    }

    #[test]
    fn test_candidates_start_with_loopback() {
        assert_eq!(lan_candidates()[0], "127.0.0.1");
    }
}
