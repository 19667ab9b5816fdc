/// Tally broadcast scheduler: two independently-firing periodic tasks.
///
/// The update tick serializes the four switcher-state parameters and fans
/// them out to every registered destination at the configured rate. The
/// heartbeat tick toggles and sends the liveness flag at a fixed 500 ms
/// cadence regardless of update-tick load — receivers depend on it to
/// distinguish a frozen sender from "data says false".
///
/// A send failure to one destination never aborts the rest of the tick and
/// never crashes the scheduler; it is logged, counted, and naturally
/// retried by the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rosc::OscMessage;
use tracing::{debug, info};

use tally_protocol::message::bool_message;
use tally_protocol::params::{ParameterTable, Tally};
use tally_protocol::HEARTBEAT_INTERVAL_MS;

use crate::registry::PeerRegistry;
use crate::status::{StatusSnapshot, StatusTx};
use crate::transport::{self, Destination};

/// Shared handles for both tick tasks.
pub struct BroadcastCtx {
    pub params: Arc<ParameterTable>,
    pub registry: Arc<PeerRegistry>,
    pub status: StatusTx,
    pub send_failures: Arc<AtomicU64>,
}

/// Run the update tick at the configured rate.
pub async fn run_update(ctx: Arc<BroadcastCtx>, update_rate_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(update_rate_ms));
    info!(update_rate_ms, "tally broadcaster started");

    loop {
        interval.tick().await;
        update_tick(&ctx).await;
    }
}

/// Run the heartbeat tick at the fixed interval.
pub async fn run_heartbeat(ctx: Arc<BroadcastCtx>) {
    let mut interval = tokio::time::interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
    info!(interval_ms = HEARTBEAT_INTERVAL_MS, "heartbeat started");

    loop {
        interval.tick().await;
        heartbeat_tick(&ctx).await;
    }
}

/// One update tick: send every state parameter, under each of its
/// addresses, to every current destination. Zero destinations is a no-op.
pub async fn update_tick(ctx: &BroadcastCtx) {
    let destinations = ctx.registry.snapshot().await;

    if !destinations.is_empty() {
        for tally in Tally::STATE {
            let value = ctx.params.get(tally);
            for addr in ctx.params.addresses(tally) {
                let msg = bool_message(addr, value);
                send_to_all(&destinations, &msg, &ctx.send_failures).await;
            }
        }
    }

    publish_status(ctx, &destinations).await;
}

/// One heartbeat tick: toggle the liveness flag and send the new value.
pub async fn heartbeat_tick(ctx: &BroadcastCtx) {
    let value = ctx.params.toggle(Tally::Heartbeat);
    let destinations = ctx.registry.snapshot().await;

    for addr in ctx.params.addresses(Tally::Heartbeat) {
        let msg = bool_message(addr, value);
        send_to_all(&destinations, &msg, &ctx.send_failures).await;
    }

    publish_status(ctx, &destinations).await;
}

/// Fan one message out to every destination. Failures are isolated per
/// destination: logged and counted, never propagated.
pub async fn send_to_all(
    destinations: &[Destination],
    msg: &OscMessage,
    failures: &AtomicU64,
) {
    for dest in destinations {
        if let Err(e) = transport::send_message(dest, msg).await {
            failures.fetch_add(1, Ordering::Relaxed);
            debug!(dest = %dest.addr, addr = %msg.addr, error = %e, "send failed");
        }
    }
}

/// Nudge the presentation layer after a tick. `send_replace` succeeds with
/// or without subscribers.
async fn publish_status(ctx: &BroadcastCtx, destinations: &[Destination]) {
    ctx.status.send_replace(StatusSnapshot {
        destinations: destinations.iter().map(|d| d.addr).collect(),
        tally: ctx.params.state(),
        heartbeat: ctx.params.get(Tally::Heartbeat),
        send_failures: ctx.send_failures.load(Ordering::Relaxed),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use rosc::{OscPacket, OscType};
    use tokio::net::UdpSocket;

    use tally_protocol::params::TallyState;

    fn test_table() -> Arc<ParameterTable> {
        Arc::new(
            ParameterTable::new([
                vec!["/tally/preview".to_string()],
                vec!["/tally/program".to_string()],
                vec!["/tally/standby".to_string()],
                vec!["/tally/error".to_string()],
                vec!["/tally/heartbeat".to_string()],
            ])
            .unwrap(),
        )
    }

    fn test_ctx(params: Arc<ParameterTable>, registry: Arc<PeerRegistry>) -> BroadcastCtx {
        let (status, _status_rx) = crate::status::channel();
        BroadcastCtx {
            params,
            registry,
            status,
            send_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Collect every OSC message a socket receives until it goes quiet.
    async fn drain_messages(socket: &UdpSocket) -> Vec<(String, OscType)> {
        let mut buf = [0u8; 1500];
        let mut out = Vec::new();
        while let Ok(Ok((len, _))) =
            tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await
        {
            if let Ok((_, OscPacket::Message(msg))) = rosc::decoder::decode_udp(&buf[..len]) {
                out.push((msg.addr, msg.args[0].clone()));
            }
        }
        out
    }

    #[tokio::test]
    async fn test_update_tick_static_destination() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let params = test_table();
        params.apply(TallyState {
            preview: true,
            program: false,
            standby: false,
            error: false,
        });

        let registry = Arc::new(PeerRegistry::new());
        registry.add_static(receiver.local_addr().unwrap()).await.unwrap();

        let ctx = test_ctx(params, registry);
        update_tick(&ctx).await;

        let messages: HashMap<String, OscType> =
            drain_messages(&receiver).await.into_iter().collect();

        // Exactly one message per state parameter, heartbeat excluded
        assert_eq!(messages.len(), 4);
        assert_eq!(messages["/tally/preview"], OscType::Bool(true));
        assert_eq!(messages["/tally/program"], OscType::Bool(false));
        assert_eq!(messages["/tally/standby"], OscType::Bool(false));
        assert_eq!(messages["/tally/error"], OscType::Bool(false));
        assert_eq!(ctx.send_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_update_tick_with_no_destinations() {
        let ctx = test_ctx(test_table(), Arc::new(PeerRegistry::new()));
        update_tick(&ctx).await;
        assert_eq!(ctx.send_failures.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_alternates_on_the_wire() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = Arc::new(PeerRegistry::new());
        registry.add_static(receiver.local_addr().unwrap()).await.unwrap();

        let ctx = test_ctx(test_table(), registry);
        heartbeat_tick(&ctx).await;
        heartbeat_tick(&ctx).await;
        heartbeat_tick(&ctx).await;

        let values: Vec<OscType> = drain_messages(&receiver)
            .await
            .into_iter()
            .map(|(addr, value)| {
                assert_eq!(addr, "/tally/heartbeat");
                value
            })
            .collect();
        assert_eq!(
            values,
            vec![
                OscType::Bool(true),
                OscType::Bool(false),
                OscType::Bool(true)
            ]
        );
    }

    #[tokio::test]
    async fn test_send_failure_does_not_block_other_destinations() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let good = transport::connect(receiver.local_addr().unwrap())
            .await
            .unwrap();

        // A bound-but-unconnected socket makes send() fail deterministically
        let bad = Destination {
            addr: "127.0.0.1:9".parse().unwrap(),
            socket: Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap()),
        };

        let failures = AtomicU64::new(0);
        let msg = bool_message("/tally/program", true);
        send_to_all(&[bad, good], &msg, &failures).await;

        assert_eq!(failures.load(Ordering::Relaxed), 1);
        let messages = drain_messages(&receiver).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "/tally/program");
    }

    #[tokio::test]
    async fn test_status_published_after_tick() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let registry = Arc::new(PeerRegistry::new());
        registry.add_static(receiver.local_addr().unwrap()).await.unwrap();

        let params = test_table();
        let (status, mut status_rx) = crate::status::channel();
        let ctx = BroadcastCtx {
            params,
            registry,
            status,
            send_failures: Arc::new(AtomicU64::new(0)),
        };

        ctx.params.set(Tally::Error, true);
        update_tick(&ctx).await;

        assert!(status_rx.changed().await.is_ok());
        let snapshot = status_rx.borrow().clone();
        assert_eq!(snapshot.destinations, vec![receiver.local_addr().unwrap()]);
        assert!(snapshot.tally.error);
        assert!(!snapshot.heartbeat);
    }
}
