/// Upstream state input: an OSC listener that lets a vision-mixer
/// integration (or anything else) push tally state into the parameter
/// table.
///
/// Supported OSC addresses:
///   /tallynet/state/preview   <bool|int|float>
///   /tallynet/state/program   <bool|int|float>
///   /tallynet/state/standby   <bool|int|float>
///   /tallynet/state/error     <bool|int|float>
///
/// The heartbeat parameter is owned by the scheduler and cannot be set
/// here. Malformed packets are dropped, never fatal.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use rosc::{OscMessage, OscPacket};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use tally_protocol::message::bool_arg;
use tally_protocol::params::{ParameterTable, Tally};
use tally_protocol::STATE_ADDRESS_PREFIX;

/// Run the OSC listener on the configured port.
pub async fn run(params: Arc<ParameterTable>, listen_port: u16) -> anyhow::Result<()> {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, listen_port);
    let socket = UdpSocket::bind(addr).await?;

    info!(port = listen_port, "OSC state listener started");

    let mut buf = [0u8; 1500];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, source)) => match rosc::decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => handle_packet(&params, &packet),
                Err(e) => {
                    debug!(from = %source, "invalid OSC packet: {:?}", e);
                }
            },
            Err(e) => {
                error!("OSC receive error: {}", e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

fn handle_packet(params: &ParameterTable, packet: &OscPacket) {
    match packet {
        OscPacket::Message(msg) => handle_message(params, msg),
        OscPacket::Bundle(bundle) => {
            for item in &bundle.content {
                handle_packet(params, item);
            }
        }
    }
}

fn handle_message(params: &ParameterTable, msg: &OscMessage) {
    let Some(name) = msg.addr.strip_prefix(STATE_ADDRESS_PREFIX) else {
        debug!(addr = %msg.addr, "unhandled OSC address");
        return;
    };

    let Some(tally) = Tally::from_name(name) else {
        debug!(addr = %msg.addr, "unknown tally parameter");
        return;
    };

    if tally == Tally::Heartbeat {
        warn!("heartbeat is scheduler-owned and cannot be set via OSC, ignoring");
        return;
    }

    let Some(value) = bool_arg(msg) else {
        debug!(addr = %msg.addr, args = ?msg.args, "message has no boolean argument");
        return;
    };

    debug!(parameter = tally.name(), value, "tally state updated via OSC");
    params.set(tally, value);
}
