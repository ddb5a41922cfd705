pub(crate) const DEFAULT_PORT: u16 = 5000;
pub(crate) const PEER_PORT_RANGE_START: u16 = 5000;
pub(crate) const PEER_PORT_RANGE_END: u16 = 5003;
pub(crate) const NEIGHBOR_IP_RANGE_START: u8 = 0;
pub(crate) const NEIGHBOR_IP_RANGE_END: u8 = 0;
pub(crate) const PROBE_TIMEOUT_MILLIS: u64 = 1_000;
