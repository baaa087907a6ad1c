//! Resolving this node's device entry in the ring.

use std::net::IpAddr;

use tracing::{debug, warn};

use crate::ring::Ring;

/// Addresses of every AF_INET interface on this node. Failure to enumerate
/// interfaces logs and returns empty; the caller proceeds with an
/// unresolved device.
pub fn local_ips() -> Vec<IpAddr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces.into_iter().map(|(_, addr)| addr).collect(),
        Err(e) => {
            warn!(error = %e, "could not enumerate network interfaces");
            Vec::new()
        }
    }
}

/// Scan the ring's device list once for an entry matching a local IP and
/// this device name. Returns `(dev_id, ip)`, or `None` when this device is
/// not in the ring (the resource is still walked; peer and handoff
/// annotations are then unreliable).
pub fn resolve_device(ring: &Ring, device_name: &str, ips: &[IpAddr]) -> Option<(i64, String)> {
    for dev in ring.all_devices() {
        if dev.device != device_name {
            continue;
        }
        let Ok(dev_ip) = dev.ip.parse::<IpAddr>() else {
            continue;
        };
        if ips.contains(&dev_ip) {
            debug!(device = %device_name, dev_id = dev.id, ip = %dev.ip, "device resolved in ring");
            return Some((i64::from(dev.id), dev.ip.clone()));
        }
    }
    None
}
