//! Launch command builders, one per foundation kind.
//!
//! Builders are pure: they map a [`FoundationSpec`] to the command line to spawn and the
//! readiness strategy the supervisor should apply to the spawned process output.

use std::fmt;

use crate::ports;
use crate::types::{FoundationSpec, ProviderDeclaration, ProviderKind};

pub mod dev;
pub mod fork;
pub mod topology;

pub const DEFAULT_FORK_PORT: u16 = 8000;
pub const DEFAULT_DEV_WS_PORT: u16 = 9944;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        LaunchCommand { command: command.into(), args }
    }

    /// Value of the first `<flag>=<value>` argument.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        let prefix = format!("{}=", flag);
        self.args.iter().find_map(|arg| arg.strip_prefix(prefix.as_str()))
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.args.join(" "))
    }
}

/// How the supervisor decides a spawned process is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Ready once `occurrences` output lines contain any of the markers.
    Marker { markers: Vec<String>, occurrences: usize },
    /// Ready once every named chain has a known websocket endpoint.
    Endpoints { chains: Vec<EndpointWatch> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointWatch {
    pub chain: String,
    pub known: Option<String>,
}

impl Readiness {
    pub fn markers(markers: &[&str], occurrences: usize) -> Self {
        Readiness::Marker {
            markers: markers.iter().map(|marker| marker.to_string()).collect(),
            occurrences,
        }
    }
}

/// One process to spawn for an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub name: String,
    pub command: LaunchCommand,
    pub readiness: Readiness,
}

/// Builds the processes backing a foundation, empty for `read_only`.
pub fn plan_launch(foundation: &FoundationSpec, worker_id: Option<u16>) -> Vec<LaunchPlan> {
    match foundation {
        FoundationSpec::Dev(spec) => vec![LaunchPlan {
            name: spec.name.clone().unwrap_or_else(|| "node".into()),
            command: dev::build_dev_command(spec, worker_id),
            readiness: dev::readiness(),
        }],
        FoundationSpec::SimulatedFork(spec) => vec![LaunchPlan {
            name: "chopsticks".into(),
            command: fork::build_fork_command(spec),
            readiness: fork::readiness(spec),
        }],
        FoundationSpec::SimulatedTopology(spec) => vec![LaunchPlan {
            name: "topology".into(),
            command: topology::build_topology_command(spec),
            readiness: topology::readiness(spec),
        }],
        FoundationSpec::ReadOnly => vec![],
    }
}

/// Websocket port a synthesized default provider connects to, when the foundation has one.
pub fn default_ws_port(foundation: &FoundationSpec, worker_id: Option<u16>) -> Option<u16> {
    match foundation {
        FoundationSpec::Dev(spec) => match &spec.options {
            Some(options) => {
                let explicit = LaunchCommand::new(&spec.bin_path, options.clone());
                explicit
                    .flag_value("--ws-port")
                    .or(explicit.flag_value("--rpc-port"))
                    .and_then(|port| port.parse().ok())
                    .or(Some(DEFAULT_DEV_WS_PORT))
            }
            None => Some(ports::allocate(worker_id, spec.ports.as_ref()).ws),
        },
        FoundationSpec::SimulatedFork(spec) if spec.chains.len() == 1 => {
            Some(spec.chains[0].port.unwrap_or(DEFAULT_FORK_PORT))
        }
        _ => None,
    }
}

/// Connections to use when an environment declares none.
pub fn default_connections(
    foundation: &FoundationSpec,
    worker_id: Option<u16>,
) -> Vec<ProviderDeclaration> {
    match default_ws_port(foundation, worker_id) {
        Some(port) => vec![ProviderDeclaration {
            name: "node".into(),
            kind: ProviderKind::Generic,
            endpoints: vec![format!("ws://127.0.0.1:{}", port)],
        }],
        None => vec![],
    }
}
