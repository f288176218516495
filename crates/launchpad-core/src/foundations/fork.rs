use super::{LaunchCommand, Readiness};
use crate::types::{ForkFoundationSpec, ForkLaunchSpec};

pub const DEFAULT_CHOPSTICKS_BIN: &str = "node_modules/.bin/chopsticks";
pub const FORK_READY_MARKER: &str = "listening on port";

pub fn build_fork_command(spec: &ForkFoundationSpec) -> LaunchCommand {
    let command = spec.bin_path.clone().unwrap_or_else(|| DEFAULT_CHOPSTICKS_BIN.to_string());
    match spec.chains.as_slice() {
        [chain] => LaunchCommand::new(command, single_chain_args(chain)),
        chains => LaunchCommand::new(command, multi_chain_args(chains)),
    }
}

fn single_chain_args(chain: &ForkLaunchSpec) -> Vec<String> {
    let mode = chain.build_block_mode.unwrap_or_default();
    let mut args = vec![
        "dev".to_string(),
        format!("--config={}", chain.config_path),
        format!("--build-block-mode={}", mode.code()),
    ];
    if let Some(port) = chain.port {
        args.push(format!("--port={}", port));
    }
    if let Some(wasm) = &chain.wasm_override {
        args.push(format!("--wasm-override={}", wasm));
    }
    args
}

// Port, build-block mode and wasm overrides are not forwarded in xcm mode.
fn multi_chain_args(chains: &[ForkLaunchSpec]) -> Vec<String> {
    let mut args = vec!["xcm".to_string()];
    for chain in chains {
        let role = chain.role.unwrap_or_default();
        args.push(format!("{}={}", role.flag(), chain.config_path));
    }
    args
}

pub fn readiness(spec: &ForkFoundationSpec) -> Readiness {
    Readiness::markers(&[FORK_READY_MARKER], spec.chains.len().max(1))
}
