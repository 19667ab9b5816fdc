use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ConfigError;

/// The five fixed tally parameters. Checked construction — there is no way
/// to name a parameter outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tally {
    Preview,
    Program,
    Standby,
    Error,
    Heartbeat,
}

impl Tally {
    /// All five parameters, in broadcast order.
    pub const ALL: [Tally; 5] = [
        Tally::Preview,
        Tally::Program,
        Tally::Standby,
        Tally::Error,
        Tally::Heartbeat,
    ];

    /// The four switcher-state parameters sent on the update tick.
    /// Heartbeat is owned by its own timer.
    pub const STATE: [Tally; 4] = [
        Tally::Preview,
        Tally::Program,
        Tally::Standby,
        Tally::Error,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tally::Preview => "preview",
            Tally::Program => "program",
            Tally::Standby => "standby",
            Tally::Error => "error",
            Tally::Heartbeat => "heartbeat",
        }
    }

    pub fn from_name(name: &str) -> Option<Tally> {
        match name {
            "preview" => Some(Tally::Preview),
            "program" => Some(Tally::Program),
            "standby" => Some(Tally::Standby),
            "error" => Some(Tally::Error),
            "heartbeat" => Some(Tally::Heartbeat),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Snapshot of the four switcher-state flags as supplied by the upstream
/// producer. Heartbeat is deliberately absent — it belongs to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyState {
    pub preview: bool,
    pub program: bool,
    pub standby: bool,
    pub error: bool,
}

/// Named boolean tally parameters and the OSC addresses each is published
/// under. Values are per-parameter atomics so the broadcast ticks read and
/// the upstream producer writes without locking. Addresses are fixed at
/// startup and never change.
#[derive(Debug)]
pub struct ParameterTable {
    values: [AtomicBool; 5],
    addresses: [Vec<String>; 5],
}

impl ParameterTable {
    /// Build the table from per-parameter address lists, ordered as
    /// [`Tally::ALL`]. Every parameter must have at least one address and
    /// every address must be a rooted OSC path.
    pub fn new(addresses: [Vec<String>; 5]) -> Result<Self, ConfigError> {
        for (tally, addrs) in Tally::ALL.iter().zip(addresses.iter()) {
            if addrs.is_empty() {
                return Err(ConfigError::NoAddresses(tally.name()));
            }
            for addr in addrs {
                if !addr.starts_with('/') {
                    return Err(ConfigError::InvalidAddress {
                        parameter: tally.name(),
                        address: addr.clone(),
                    });
                }
            }
        }

        Ok(Self {
            values: Default::default(),
            addresses,
        })
    }

    pub fn get(&self, tally: Tally) -> bool {
        self.values[tally.index()].load(Ordering::Relaxed)
    }

    pub fn set(&self, tally: Tally, value: bool) {
        self.values[tally.index()].store(value, Ordering::Relaxed);
    }

    /// Flip a parameter and return the new value. Used by the heartbeat tick.
    pub fn toggle(&self, tally: Tally) -> bool {
        !self.values[tally.index()].fetch_xor(true, Ordering::Relaxed)
    }

    pub fn addresses(&self, tally: Tally) -> &[String] {
        &self.addresses[tally.index()]
    }

    /// Set the four switcher-state flags in one call.
    pub fn apply(&self, state: TallyState) {
        self.set(Tally::Preview, state.preview);
        self.set(Tally::Program, state.program);
        self.set(Tally::Standby, state.standby);
        self.set(Tally::Error, state.error);
    }

    pub fn state(&self) -> TallyState {
        TallyState {
            preview: self.get(Tally::Preview),
            program: self.get(Tally::Program),
            standby: self.get(Tally::Standby),
            error: self.get(Tally::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ParameterTable {
        ParameterTable::new([
            vec!["/tally/preview".to_string()],
            vec!["/tally/program".to_string()],
            vec!["/tally/standby".to_string()],
            vec!["/tally/error".to_string()],
            vec!["/tally/heartbeat".to_string()],
        ])
        .unwrap()
    }

    #[test]
    fn test_values_default_false() {
        let table = table();
        for tally in Tally::ALL {
            assert!(!table.get(tally));
        }
    }

    #[test]
    fn test_set_get() {
        let table = table();
        table.set(Tally::Preview, true);
        assert!(table.get(Tally::Preview));
        assert!(!table.get(Tally::Program));
        table.set(Tally::Preview, false);
        assert!(!table.get(Tally::Preview));
    }

    #[test]
    fn test_heartbeat_strictly_alternates() {
        let table = table();
        assert!(table.toggle(Tally::Heartbeat));
        assert!(!table.toggle(Tally::Heartbeat));
        assert!(table.toggle(Tally::Heartbeat));
    }

    #[test]
    fn test_apply_does_not_touch_heartbeat() {
        let table = table();
        table.set(Tally::Heartbeat, true);
        table.apply(TallyState {
            preview: true,
            program: false,
            standby: true,
            error: false,
        });
        assert!(table.get(Tally::Preview));
        assert!(table.get(Tally::Standby));
        assert!(table.get(Tally::Heartbeat));
    }

    #[test]
    fn test_empty_address_list_rejected() {
        let err = ParameterTable::new([
            vec!["/tally/preview".to_string()],
            vec![],
            vec!["/tally/standby".to_string()],
            vec!["/tally/error".to_string()],
            vec!["/tally/heartbeat".to_string()],
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoAddresses("program")));
    }

    #[test]
    fn test_unrooted_address_rejected() {
        let err = ParameterTable::new([
            vec!["tally/preview".to_string()],
            vec!["/tally/program".to_string()],
            vec!["/tally/standby".to_string()],
            vec!["/tally/error".to_string()],
            vec!["/tally/heartbeat".to_string()],
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { parameter: "preview", .. }));
    }

    #[test]
    fn test_name_round_trip() {
        for tally in Tally::ALL {
            assert_eq!(Tally::from_name(tally.name()), Some(tally));
        }
        assert_eq!(Tally::from_name("psm"), None);
    }
}
