use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::sender::Targets;

/// Compute subnet-specific broadcast addresses for all non-loopback IPv4
/// interfaces. Sending only to 255.255.255.255 may leave the wrong interface
/// on multi-homed hosts, so the limited broadcast is used as a fallback when
/// no interface qualifies.
pub fn subnet_broadcast_targets(port: u16) -> Vec<SocketAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(err) => {
            warn!("failed to enumerate interfaces: {err}");
            Vec::new()
        }
    };

    let mut addrs: Vec<SocketAddr> = Vec::new();
    for interface in interfaces {
        if interface.is_loopback() {
            continue;
        }
        if let if_addrs::IfAddr::V4(v4) = interface.addr {
            let broadcast = v4.broadcast.unwrap_or_else(|| {
                let ip = u32::from(v4.ip);
                let mask = u32::from(v4.netmask);
                Ipv4Addr::from(ip | !mask)
            });
            let addr = SocketAddr::new(IpAddr::V4(broadcast), port);
            if !addrs.contains(&addr) {
                addrs.push(addr);
            }
        }
    }

    if addrs.is_empty() {
        addrs.push(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port));
    }
    addrs
}

/// Handle to stop the target refresh loop.
pub struct RefreshHandle {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.handle.await;
    }
}

/// Periodically recompute the subnet broadcast targets and publish them into
/// the shared target list.
pub fn spawn_target_refresh(targets: Targets, port: u16, period: Duration) -> RefreshHandle {
    let (stop_tx, mut stop_rx) = mpsc::channel(1);
    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    let addrs = subnet_broadcast_targets(port);
                    debug!("refreshed broadcast targets: {addrs:?}");
                    targets.replace(addrs).await;
                }
            }
        }
    });
    RefreshHandle { stop_tx, handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_yields_at_least_one_target() {
        let targets = subnet_broadcast_targets(21324);
        assert!(!targets.is_empty());
        assert!(targets.iter().all(|addr| addr.port() == 21324));
    }

    #[tokio::test]
    async fn refresh_populates_the_target_list() {
        let targets = Targets::default();
        let handle = spawn_target_refresh(targets.clone(), 21324, Duration::from_secs(60));
        // The first interval tick fires immediately.
        for _ in 0..100 {
            if targets.has_targets().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(targets.has_targets().await);
        handle.stop().await;
    }
}
