/// UDP transport: one persistent connected socket per destination,
/// fire-and-forget sends. The caller never waits for acknowledgment —
/// OSC over UDP gives no delivery guarantee.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use rosc::OscMessage;
use tokio::net::UdpSocket;

use tally_protocol::error::TransportError;
use tally_protocol::message;

/// A resolved send target with its connected socket. Cloning shares the
/// socket; it closes when the owning registry drops the last reference.
#[derive(Debug, Clone)]
pub struct Destination {
    pub addr: SocketAddr,
    pub socket: Arc<UdpSocket>,
}

/// Open a connected UDP socket to the destination.
pub async fn connect(addr: SocketAddr) -> Result<Destination, TransportError> {
    let bind_addr: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| TransportError::Connect { dest: addr, source: e })?;
    socket
        .connect(addr)
        .await
        .map_err(|e| TransportError::Connect { dest: addr, source: e })?;

    Ok(Destination {
        addr,
        socket: Arc::new(socket),
    })
}

/// Encode and send one OSC message to one destination.
pub async fn send_message(dest: &Destination, msg: &OscMessage) -> Result<(), TransportError> {
    let buf = message::encode(msg)?;
    dest.socket
        .send(&buf)
        .await
        .map_err(|e| TransportError::Send { dest: dest.addr, source: e })?;
    Ok(())
}
