use rosc::{OscMessage, OscPacket, OscType};

use crate::error::TransportError;

/// Build an OSC message carrying a single canonical True/False argument
/// (type tag `T` or `F`, no payload bytes).
pub fn bool_message(addr: &str, value: bool) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args: vec![OscType::Bool(value)],
    }
}

/// Encode a message into its UDP wire form.
pub fn encode(msg: &OscMessage) -> Result<Vec<u8>, TransportError> {
    rosc::encoder::encode(&OscPacket::Message(msg.clone())).map_err(|e| {
        TransportError::Encode {
            addr: msg.addr.clone(),
            reason: format!("{e:?}"),
        }
    })
}

/// Interpret the first argument of a message as a boolean. Accepts the
/// canonical True/False tags plus the int/float forms some senders use.
pub fn bool_arg(msg: &OscMessage) -> Option<bool> {
    match msg.args.first()? {
        OscType::Bool(b) => Some(*b),
        OscType::Int(i) => Some(*i != 0),
        OscType::Long(i) => Some(*i != 0),
        OscType::Float(f) => Some(*f != 0.0),
        OscType::Double(f) => Some(*f != 0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_message_uses_canonical_tags() {
        let msg = bool_message("/tally/preview", true);
        assert_eq!(msg.addr, "/tally/preview");
        assert_eq!(msg.args, vec![OscType::Bool(true)]);

        // The canonical tags carry the value in the tag itself — the
        // encoded message must contain no argument payload bytes.
        let on = encode(&bool_message("/x", true)).unwrap();
        let off = encode(&bool_message("/x", false)).unwrap();
        assert_eq!(on.len(), off.len());
        assert!(on.windows(2).any(|w| w == b",T"));
        assert!(off.windows(2).any(|w| w == b",F"));
    }

    #[test]
    fn test_bool_arg_accepts_int_forms() {
        let mut msg = bool_message("/x", true);
        assert_eq!(bool_arg(&msg), Some(true));

        msg.args = vec![OscType::Int(1)];
        assert_eq!(bool_arg(&msg), Some(true));
        msg.args = vec![OscType::Int(0)];
        assert_eq!(bool_arg(&msg), Some(false));
        msg.args = vec![OscType::Float(1.0)];
        assert_eq!(bool_arg(&msg), Some(true));
        msg.args = vec![OscType::String("on".to_string())];
        assert_eq!(bool_arg(&msg), None);
        msg.args = vec![];
        assert_eq!(bool_arg(&msg), None);
    }
}
