use std::net::IpAddr;

use serde::Deserialize;

use tally_protocol::error::ConfigError;
use tally_protocol::params::ParameterTable;
use tally_protocol::{
    DEFAULT_CAPABILITY_MARKER, DEFAULT_CUSTOM_PORT, DEFAULT_LISTENER_PORT,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_UPDATE_RATE_MS,
};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sender: SenderSection,
    #[serde(default)]
    pub custom_port: CustomPortSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub listener: ListenerSection,
    #[serde(default)]
    pub addresses: AddressesSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderSection {
    #[serde(default = "default_update_rate")]
    pub update_rate_ms: u64,
}

impl Default for SenderSection {
    fn default() -> Self {
        Self {
            update_rate_ms: default_update_rate(),
        }
    }
}

/// Static destination mode: one fixed receiver instead of (or alongside)
/// discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPortSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_custom_host")]
    pub host: String,
    #[serde(default = "default_custom_port")]
    pub port: u16,
}

impl Default for CustomPortSection {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_custom_host(),
            port: default_custom_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Address-space endpoint a peer must expose to be accepted
    #[serde(default = "default_capability_marker")]
    pub capability_marker: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Evict a peer not re-confirmed within this window. 0 = retain forever.
    #[serde(default)]
    pub stale_after_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            enabled: true,
            capability_marker: default_capability_marker(),
            probe_timeout_ms: default_probe_timeout(),
            stale_after_secs: 0,
        }
    }
}

/// Upstream state input: an OSC listener mutating the tally flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_listener_port")]
    pub port: u16,
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_listener_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressesSection {
    #[serde(default = "default_preview_addrs")]
    pub preview: Vec<String>,
    #[serde(default = "default_program_addrs")]
    pub program: Vec<String>,
    #[serde(default = "default_standby_addrs")]
    pub standby: Vec<String>,
    #[serde(default = "default_error_addrs")]
    pub error: Vec<String>,
    #[serde(default = "default_heartbeat_addrs")]
    pub heartbeat: Vec<String>,
}

impl Default for AddressesSection {
    fn default() -> Self {
        Self {
            preview: default_preview_addrs(),
            program: default_program_addrs(),
            standby: default_standby_addrs(),
            error: default_error_addrs(),
            heartbeat: default_heartbeat_addrs(),
        }
    }
}

// Default value functions
fn default_update_rate() -> u64 { DEFAULT_UPDATE_RATE_MS }
fn default_custom_host() -> String { "127.0.0.1".to_string() }
fn default_custom_port() -> u16 { DEFAULT_CUSTOM_PORT }
fn default_true() -> bool { true }
fn default_capability_marker() -> String { DEFAULT_CAPABILITY_MARKER.to_string() }
fn default_probe_timeout() -> u64 { DEFAULT_PROBE_TIMEOUT_MS }
fn default_listener_port() -> u16 { DEFAULT_LISTENER_PORT }
fn default_preview_addrs() -> Vec<String> { vec!["/tally/preview".to_string()] }
fn default_program_addrs() -> Vec<String> { vec!["/tally/program".to_string()] }
fn default_standby_addrs() -> Vec<String> { vec!["/tally/standby".to_string()] }
fn default_error_addrs() -> Vec<String> { vec!["/tally/error".to_string()] }
fn default_heartbeat_addrs() -> Vec<String> { vec!["/tally/heartbeat".to_string()] }

impl Config {
    /// Parse and validate. Any failure here is fatal at startup.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sender.update_rate_ms == 0 {
            return Err(ConfigError::ZeroUpdateRate);
        }
        if self.custom_port.enabled {
            self.custom_host()?;
        }
        // Address invariants are checked by table construction.
        self.parameter_table().map(|_| ())
    }

    pub fn custom_host(&self) -> Result<IpAddr, ConfigError> {
        self.custom_port
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.custom_port.host.clone()))
    }

    pub fn parameter_table(&self) -> Result<ParameterTable, ConfigError> {
        ParameterTable::new([
            self.addresses.preview.clone(),
            self.addresses.program.clone(),
            self.addresses.standby.clone(),
            self.addresses.error.clone(),
            self.addresses.heartbeat.clone(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_protocol::params::Tally;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.sender.update_rate_ms, DEFAULT_UPDATE_RATE_MS);
        assert!(!config.custom_port.enabled);
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.stale_after_secs, 0);

        let table = config.parameter_table().unwrap();
        assert_eq!(table.addresses(Tally::Preview), ["/tally/preview"]);
    }

    #[test]
    fn test_zero_update_rate_is_fatal() {
        let err = Config::from_toml("[sender]\nupdate_rate_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroUpdateRate));
    }

    #[test]
    fn test_empty_address_list_is_fatal() {
        let err = Config::from_toml("[addresses]\nprogram = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoAddresses("program")));
    }

    #[test]
    fn test_bad_custom_host_is_fatal() {
        let raw = "[custom_port]\nenabled = true\nhost = \"not-an-ip\"\n";
        let err = Config::from_toml(raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost(_)));
    }

    #[test]
    fn test_multiple_addresses_per_parameter() {
        let raw = r#"
[addresses]
preview = ["/tally/preview", "/composition/layers/1/video/preview"]
"#;
        let config = Config::from_toml(raw).unwrap();
        let table = config.parameter_table().unwrap();
        assert_eq!(table.addresses(Tally::Preview).len(), 2);
    }
}
