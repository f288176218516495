use super::{EndpointWatch, LaunchCommand, Readiness};
use crate::types::TopologySpec;

pub const DEFAULT_TOPOLOGY_BIN: &str = "zombienet";

pub fn build_topology_command(spec: &TopologySpec) -> LaunchCommand {
    let command = spec.bin_path.clone().unwrap_or_else(|| DEFAULT_TOPOLOGY_BIN.to_string());
    let mut args = vec!["spawn".to_string(), "--provider=native".to_string()];
    for chain in spec.chains.iter() {
        args.push(format!("{}={}", chain.role.flag(), chain.config_path));
    }
    LaunchCommand::new(command, args)
}

pub fn readiness(spec: &TopologySpec) -> Readiness {
    Readiness::Endpoints {
        chains: spec
            .chains
            .iter()
            .map(|chain| EndpointWatch {
                chain: chain.name.clone(),
                known: chain.ws_port.map(|port| format!("ws://127.0.0.1:{}", port)),
            })
            .collect(),
    }
}

/// Websocket URL announced on a coordinator output line for `chain`.
pub fn discover_endpoint(line: &str, chain: &str) -> Option<String> {
    if !line.contains(chain) {
        return None;
    }
    line.split_whitespace()
        .find(|token| token.starts_with("ws://") || token.starts_with("wss://"))
        .map(|token| token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric()).to_string())
}
