/// OSCQuery peer discovery.
///
/// Browses `_oscjson._tcp.local.` via mDNS. Each resolved advertisement is
/// probed over HTTP for the capability marker endpoint in its OSC address
/// space; accepted peers have their OSC transport address resolved from
/// `?HOST_INFO` and are registered as send destinations. Probes run as
/// independent tasks so one slow candidate never holds up the rest, and a
/// failed probe rejects only that candidate — the browse loop continues.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use tally_protocol::error::DiscoveryError;
use tally_protocol::profile::ServiceProfile;
use tally_protocol::OSCQUERY_SERVICE_TYPE;

use crate::registry::PeerRegistry;

pub struct DiscoveryCtx {
    pub registry: Arc<PeerRegistry>,
    pub http: reqwest::Client,
    pub capability_marker: String,
    /// Evict peers not re-confirmed within this window; None = retain forever
    pub stale_after: Option<Duration>,
}

/// Run the mDNS browse loop.
pub async fn run(ctx: Arc<DiscoveryCtx>) -> anyhow::Result<()> {
    let mdns = ServiceDaemon::new()?;
    let receiver = mdns.browse(OSCQUERY_SERVICE_TYPE)?;

    info!(
        service_type = OSCQUERY_SERVICE_TYPE,
        marker = %ctx.capability_marker,
        "browsing for OSCQuery peers"
    );

    loop {
        // recv_async() yields to the runtime instead of blocking the
        // executor thread.
        let event = match receiver.recv_async().await {
            Ok(event) => event,
            Err(e) => {
                error!("mDNS browse channel closed: {}", e);
                return Err(anyhow::anyhow!("mDNS browse channel closed unexpectedly"));
            }
        };

        match event {
            ServiceEvent::ServiceResolved(info) => {
                handle_service_resolved(&ctx, &info).await;
            }

            ServiceEvent::ServiceRemoved(_service_type, fullname) => {
                handle_service_removed(&ctx, &fullname).await;
            }

            ServiceEvent::SearchStarted(service_type) => {
                info!(service_type = %service_type, "mDNS search started");
            }

            ServiceEvent::SearchStopped(service_type) => {
                info!(service_type = %service_type, "mDNS search stopped");
            }

            ServiceEvent::ServiceFound(service_type, fullname) => {
                debug!(
                    service_type = %service_type,
                    name = %fullname,
                    "mDNS service found (awaiting resolution)"
                );
            }
        }
    }
}

/// Spawn an independent probe for a newly resolved advertisement. Profiles
/// already seen (probing, accepted, or rejected) only get their last-seen
/// time refreshed.
async fn handle_service_resolved(ctx: &Arc<DiscoveryCtx>, info: &mdns_sd::ServiceInfo) {
    let Some(host) = info.get_addresses().iter().copied().next() else {
        debug!(name = %info.get_fullname(), "resolved service has no addresses, skipping");
        return;
    };

    let profile = ServiceProfile::new(info.get_fullname(), host, info.get_port());

    if !ctx.registry.claim_probe(&profile).await {
        debug!(profile = %profile, "advertisement for known profile, not re-probing");
        return;
    }

    info!(profile = %profile, "probing discovered OSCQuery service");

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        match probe(&ctx.http, &profile, &ctx.capability_marker).await {
            Ok(osc_addr) => match ctx.registry.add_dynamic(profile.clone(), osc_addr).await {
                Ok(true) => {
                    info!(profile = %profile, osc = %osc_addr, "peer accepted");
                }
                Ok(false) => {
                    debug!(profile = %profile, "peer already registered");
                }
                Err(e) => {
                    warn!(profile = %profile, error = %e, "could not connect to accepted peer");
                    ctx.registry.record_rejected(profile).await;
                }
            },
            Err(e) => {
                debug!(profile = %profile, error = %e, "peer rejected");
                ctx.registry.record_rejected(profile).await;
            }
        }
    });
}

/// A disappeared advertisement only matters when staleness eviction is on;
/// the base behavior retains peers until restart.
async fn handle_service_removed(ctx: &Arc<DiscoveryCtx>, fullname: &str) {
    if ctx.stale_after.is_some() {
        ctx.registry.evict_by_name(fullname).await;
    } else {
        debug!(name = %fullname, "service removed from network, destination retained");
    }
}

/// Probe one candidate: fetch its OSC namespace, require the capability
/// marker, then resolve the OSC transport address from HOST_INFO (falling
/// back to the advertised host/port where HOST_INFO is absent or partial).
pub async fn probe(
    http: &reqwest::Client,
    profile: &ServiceProfile,
    marker: &str,
) -> Result<SocketAddr, DiscoveryError> {
    let base = format!("http://{}:{}", profile.host, profile.port);

    let tree = fetch_json(http, &base).await?;
    if !tree_has_node(&tree, marker) {
        return Err(DiscoveryError::MarkerAbsent {
            marker: marker.to_string(),
        });
    }

    let (ip, port) = match fetch_json(http, &format!("{base}/?HOST_INFO")).await {
        Ok(host_info) => osc_endpoint(&host_info),
        Err(e) => {
            debug!(profile = %profile, error = %e, "no HOST_INFO, using advertised address");
            (None, None)
        }
    };

    Ok(SocketAddr::new(
        ip.unwrap_or(profile.host),
        port.unwrap_or(profile.port),
    ))
}

async fn fetch_json(http: &reqwest::Client, url: &str) -> Result<Value, DiscoveryError> {
    let resp = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| DiscoveryError::Probe {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    resp.json().await.map_err(|e| DiscoveryError::MalformedTree {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Walk an OSCQuery namespace document looking for the given address path.
/// Each path segment descends through a `CONTENTS` map.
pub fn tree_has_node(tree: &Value, path: &str) -> bool {
    let mut node = tree;
    for segment in path.trim_matches('/').split('/') {
        match node.get("CONTENTS").and_then(|c| c.get(segment)) {
            Some(next) => node = next,
            None => return false,
        }
    }
    true
}

/// Extract `OSC_IP` / `OSC_PORT` from a HOST_INFO document. Either may be
/// absent; the caller falls back to the advertised values.
pub fn osc_endpoint(host_info: &Value) -> (Option<IpAddr>, Option<u16>) {
    let ip = host_info
        .get("OSC_IP")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok());
    let port = host_info
        .get("OSC_PORT")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok());
    (ip, port)
}

/// Periodic eviction sweep, spawned only when a staleness window is set.
pub async fn run_eviction(registry: Arc<PeerRegistry>, max_age: Duration) {
    let sweep = max_age.min(Duration::from_secs(5)).max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(sweep);
    info!(stale_after_secs = max_age.as_secs(), "peer eviction enabled");

    loop {
        interval.tick().await;
        let evicted = registry.evict_stale(max_age).await;
        if evicted > 0 {
            info!(evicted, "evicted stale peers");
        }
    }
}
