pub mod error;
pub mod message;
pub mod params;
pub mod profile;

/// mDNS service type under which OSCQuery peers advertise themselves
pub const OSCQUERY_SERVICE_TYPE: &str = "_oscjson._tcp.local.";

/// Heartbeat interval in milliseconds. Fixed by design — receivers rely on
/// this cadence to detect a frozen sender, so it is not configurable.
pub const HEARTBEAT_INTERVAL_MS: u64 = 500;

/// Address-space endpoint whose presence marks a peer as tally-aware
pub const DEFAULT_CAPABILITY_MARKER: &str = "/tally/heartbeat";

/// OSC address prefix for upstream state updates received by the listener
pub const STATE_ADDRESS_PREFIX: &str = "/tallynet/state/";

/// Defaults
pub const DEFAULT_UPDATE_RATE_MS: u64 = 100;
pub const DEFAULT_CUSTOM_PORT: u16 = 9000;
pub const DEFAULT_LISTENER_PORT: u16 = 5577;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;
