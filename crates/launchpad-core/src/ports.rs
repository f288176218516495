use crate::types::PortOverrides;

pub const BASE_PORT: u16 = 10_000;
pub const PORTS_PER_WORKER: u16 = 100;
pub const DEFAULT_WORKER_ID: u16 = 1;
/// Highest worker identity whose port block still fits below 65535.
pub const MAX_WORKER_ID: u16 = (u16::MAX - BASE_PORT - PORTS_PER_WORKER) / PORTS_PER_WORKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedPorts {
    pub p2p: u16,
    pub rpc: u16,
    pub ws: u16,
}

impl AllocatedPorts {
    pub fn as_vec(&self) -> Vec<u16> {
        vec![self.ws, self.rpc, self.p2p]
    }
}

/// Parses a worker identity, falling back to the default on anything malformed or out of range.
pub fn parse_worker_id(raw: Option<&str>) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|id| *id <= MAX_WORKER_ID)
        .unwrap_or(DEFAULT_WORKER_ID)
}

pub fn allocate(worker_id: Option<u16>, explicit: Option<&PortOverrides>) -> AllocatedPorts {
    let worker_id = worker_id.filter(|id| *id <= MAX_WORKER_ID).unwrap_or(DEFAULT_WORKER_ID);
    let base = BASE_PORT + worker_id * PORTS_PER_WORKER;
    let explicit = explicit.copied().unwrap_or_default();
    AllocatedPorts {
        ws: explicit.ws_port.unwrap_or(base),
        rpc: explicit.rpc_port.unwrap_or(base + 1),
        p2p: explicit.p2p_port.unwrap_or(base + 2),
    }
}
