use std::fmt;
use std::net::IpAddr;

/// Identity of a discovered OSCQuery service: advertised instance name plus
/// the resolved address and HTTP port. Probing is keyed by this identity so
/// repeated advertisements of the same service are idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceProfile {
    pub name: String,
    pub host: IpAddr,
    pub port: u16,
}

impl ServiceProfile {
    pub fn new(name: impl Into<String>, host: IpAddr, port: u16) -> Self {
        Self {
            name: name.into(),
            host,
            port,
        }
    }
}

impl fmt::Display for ServiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}
