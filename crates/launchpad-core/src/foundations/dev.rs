use super::{LaunchCommand, Readiness};
use crate::ports;
use crate::types::DevLaunchSpec;

/// Manual sealing, a single well-known authority, no peers, ephemeral storage.
pub const DEV_BASELINE_ARGS: &[&str] = &[
    "--no-hardware-benchmarks",
    "--no-telemetry",
    "--reserved-only",
    "--rpc-cors=all",
    "--no-grandpa",
    "--sealing=manual",
    "--force-authoring",
    "--no-prometheus",
    "--alice",
    "--chain=moonbase-dev",
    "--in-peers=0",
    "--out-peers=0",
    "--tmp",
];

pub const DEV_READY_MARKERS: &[&str] =
    &["Running JSON-RPC", "Listening for new connections", "Development Service Ready"];

pub fn build_dev_command(spec: &DevLaunchSpec, worker_id: Option<u16>) -> LaunchCommand {
    if let Some(options) = &spec.options {
        return LaunchCommand::new(&spec.bin_path, options.clone());
    }
    let ports = ports::allocate(worker_id, spec.ports.as_ref());
    let mut args: Vec<String> = DEV_BASELINE_ARGS.iter().map(|arg| arg.to_string()).collect();
    args.push(format!("--ws-port={}", ports.ws));
    args.push(format!("--rpc-port={}", ports.rpc));
    args.push(format!("--port={}", ports.p2p));
    LaunchCommand::new(&spec.bin_path, args)
}

pub fn readiness() -> Readiness {
    Readiness::markers(DEV_READY_MARKERS, 1)
}
