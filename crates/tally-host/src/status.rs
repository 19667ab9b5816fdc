/// Presentation-layer seam. After every tick the broadcaster publishes a
/// snapshot on a watch channel; a UI (or any other observer) subscribes and
/// redraws on change. Publishing is no-op safe when nobody subscribes.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::info;

use tally_protocol::params::TallyState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub destinations: Vec<SocketAddr>,
    pub tally: TallyState,
    pub heartbeat: bool,
    pub send_failures: u64,
}

pub type StatusTx = watch::Sender<StatusSnapshot>;
pub type StatusRx = watch::Receiver<StatusSnapshot>;

pub fn channel() -> (StatusTx, StatusRx) {
    watch::channel(StatusSnapshot::default())
}

/// Minimal built-in observer: logs receiver-count transitions so a headless
/// deployment still surfaces "no receivers connected".
pub async fn run_logger(mut rx: StatusRx) {
    let mut last_count = rx.borrow().destinations.len();

    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.destinations.len() != last_count {
            if snapshot.destinations.is_empty() {
                info!("no receivers connected");
            } else {
                info!(
                    count = snapshot.destinations.len(),
                    destinations = ?snapshot.destinations,
                    "receiver set changed"
                );
            }
            last_count = snapshot.destinations.len();
        }
    }
}
