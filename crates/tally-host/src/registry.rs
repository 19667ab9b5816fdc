/// Live set of OSC send destinations.
///
/// Two sources populate it: one optional static destination (custom-port
/// mode) and zero or more dynamic destinations produced by discovery.
/// Dynamic entries are keyed by service-profile identity so repeated
/// advertisements of the same peer are idempotent, and rejected profiles
/// are remembered so they are never re-probed. All access goes through a
/// lock; broadcast ticks read a point-in-time snapshot and are never
/// affected by a concurrent discovery mutation mid-iteration.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use tally_protocol::error::TransportError;
use tally_protocol::profile::ServiceProfile;

use crate::transport::{self, Destination};

#[derive(Debug)]
enum ProbeState {
    /// Claimed by an in-flight probe task
    Probing,
    Accepted(Destination),
    Rejected,
}

#[derive(Debug)]
struct DynamicEntry {
    state: ProbeState,
    last_seen: Instant,
}

#[derive(Default)]
struct Inner {
    static_dest: Option<Destination>,
    dynamic: HashMap<ServiceProfile, DynamicEntry>,
}

#[derive(Default)]
pub struct PeerRegistry {
    inner: RwLock<Inner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single fixed destination of custom-port mode.
    pub async fn add_static(&self, addr: SocketAddr) -> Result<(), TransportError> {
        let dest = transport::connect(addr).await?;
        let mut inner = self.inner.write().await;
        inner.static_dest = Some(dest);
        info!(dest = %addr, "static OSC destination registered");
        Ok(())
    }

    /// Claim a profile for probing. Returns false when the profile is
    /// already probing, accepted, or rejected — in that case only its
    /// last-seen time is refreshed and the caller must not probe again.
    pub async fn claim_probe(&self, profile: &ServiceProfile) -> bool {
        let mut inner = self.inner.write().await;
        match inner.dynamic.get_mut(profile) {
            Some(entry) => {
                entry.last_seen = Instant::now();
                false
            }
            None => {
                inner.dynamic.insert(
                    profile.clone(),
                    DynamicEntry {
                        state: ProbeState::Probing,
                        last_seen: Instant::now(),
                    },
                );
                true
            }
        }
    }

    /// Accept a probed profile, connecting a destination for it. Returns
    /// false when the profile already has one (idempotent accept).
    pub async fn add_dynamic(
        &self,
        profile: ServiceProfile,
        addr: SocketAddr,
    ) -> Result<bool, TransportError> {
        {
            let inner = self.inner.read().await;
            if let Some(entry) = inner.dynamic.get(&profile) {
                if matches!(entry.state, ProbeState::Accepted(_)) {
                    return Ok(false);
                }
            }
        }

        // Connect outside the lock — probe tasks must not serialize on it.
        let dest = transport::connect(addr).await?;

        let mut inner = self.inner.write().await;
        let entry = inner
            .dynamic
            .entry(profile)
            .or_insert_with(|| DynamicEntry {
                state: ProbeState::Probing,
                last_seen: Instant::now(),
            });
        entry.last_seen = Instant::now();
        if matches!(entry.state, ProbeState::Accepted(_)) {
            return Ok(false);
        }
        entry.state = ProbeState::Accepted(dest);
        Ok(true)
    }

    /// Remember a profile as capability-absent (or unreachable) so it is
    /// not re-probed. Produces no destination.
    pub async fn record_rejected(&self, profile: ServiceProfile) {
        let mut inner = self.inner.write().await;
        let entry = inner
            .dynamic
            .entry(profile)
            .or_insert_with(|| DynamicEntry {
                state: ProbeState::Probing,
                last_seen: Instant::now(),
            });
        if !matches!(entry.state, ProbeState::Accepted(_)) {
            entry.state = ProbeState::Rejected;
        }
    }

    /// Consistent point-in-time copy of all current destinations, static
    /// first, dynamic ordered by address.
    pub async fn snapshot(&self) -> Vec<Destination> {
        let inner = self.inner.read().await;
        let mut dests: Vec<Destination> = Vec::new();
        if let Some(ref dest) = inner.static_dest {
            dests.push(dest.clone());
        }
        let mut dynamic: Vec<Destination> = inner
            .dynamic
            .values()
            .filter_map(|entry| match &entry.state {
                ProbeState::Accepted(dest) => Some(dest.clone()),
                _ => None,
            })
            .collect();
        dynamic.sort_by_key(|d| d.addr);
        dests.extend(dynamic);
        dests
    }

    pub async fn destination_count(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Drop all state for services advertised under the given name.
    pub async fn evict_by_name(&self, fullname: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.dynamic.len();
        inner.dynamic.retain(|profile, _| profile.name != fullname);
        let evicted = inner.dynamic.len() < before;
        if evicted {
            info!(name = %fullname, "evicted discovered peer");
        }
        evicted
    }

    /// Drop dynamic entries not re-confirmed within the window. Rejected
    /// profiles age out too, so a returning service gets re-probed.
    /// The static destination is never evicted.
    pub async fn evict_stale(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        let before = inner.dynamic.len();
        inner.dynamic.retain(|profile, entry| {
            let stale = now.duration_since(entry.last_seen) > max_age;
            if stale {
                debug!(profile = %profile, "peer not re-confirmed, evicting");
            }
            !stale
        });
        before - inner.dynamic.len()
    }
}
