use std::fmt;
use std::path::Path;

use crate::foundations::{DEFAULT_DEV_WS_PORT, DEFAULT_FORK_PORT};
use crate::providers::ProviderHandle;
use crate::supervisor::NodeView;
use crate::types::{Environment, FoundationKind, FoundationSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Launching,
    ProvidersConnecting,
    Ready,
    Destroying,
    Destroyed,
}

impl LifecycleState {
    /// States in which a network exists or is being built.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LifecycleState::Launching | LifecycleState::ProvidersConnecting | LifecycleState::Ready
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Launching => write!(f, "launching"),
            LifecycleState::ProvidersConnecting => write!(f, "providers-connecting"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Destroying => write!(f, "destroying"),
            LifecycleState::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    pub name: String,
    pub port: u16,
}

/// The running network of one environment. Only the dispatcher mutates it.
pub struct NetworkContext {
    environment: Environment,
    worker_id: Option<u16>,
    nodes: Vec<NodeView>,
    providers: Vec<ProviderHandle>,
}

impl NetworkContext {
    pub(crate) fn new(environment: Environment, worker_id: Option<u16>) -> Self {
        NetworkContext { environment, worker_id, nodes: vec![], providers: vec![] }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_name(&self) -> &str {
        &self.environment.name
    }

    pub fn foundation(&self) -> FoundationKind {
        self.environment.foundation.kind()
    }

    pub fn worker_id(&self) -> Option<u16> {
        self.worker_id
    }

    pub fn nodes(&self) -> &[NodeView] {
        &self.nodes
    }

    pub fn providers(&self) -> &[ProviderHandle] {
        &self.providers
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderHandle> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    pub fn connected_provider_count(&self) -> usize {
        self.providers.iter().filter(|provider| provider.is_connected()).count()
    }

    pub(crate) fn push_node(&mut self, node: NodeView) {
        self.nodes.push(node);
    }

    pub(crate) fn push_provider(&mut self, provider: ProviderHandle) {
        self.providers.push(provider);
    }

    pub(crate) fn providers_mut(&mut self) -> &mut Vec<ProviderHandle> {
        &mut self.providers
    }

    /// Websocket ports exposed by the running network, for display.
    pub fn service_ports(&self) -> Vec<ServicePort> {
        match &self.environment.foundation {
            FoundationSpec::Dev(_) => self
                .nodes
                .iter()
                .map(|node| ServicePort {
                    name: node.name.clone(),
                    port: node
                        .command
                        .flag_value("--ws-port")
                        .and_then(|port| port.parse().ok())
                        .unwrap_or(DEFAULT_DEV_WS_PORT),
                })
                .collect(),
            FoundationSpec::SimulatedFork(spec) => spec
                .chains
                .iter()
                .enumerate()
                .map(|(index, chain)| ServicePort {
                    name: chain.name.clone().unwrap_or_else(|| format!("chain-{}", index + 1)),
                    port: chain
                        .port
                        .or_else(|| read_fork_config_port(Path::new(&chain.config_path)))
                        .unwrap_or(DEFAULT_FORK_PORT),
                })
                .collect(),
            FoundationSpec::SimulatedTopology(_) => self
                .nodes
                .iter()
                .flat_map(|node| node.endpoints.iter())
                .filter_map(|endpoint| {
                    port_from_url(&endpoint.url)
                        .map(|port| ServicePort { name: endpoint.chain.clone(), port })
                })
                .collect(),
            FoundationSpec::ReadOnly => self
                .providers
                .iter()
                .filter_map(|provider| {
                    port_from_url(&provider.endpoint)
                        .map(|port| ServicePort { name: provider.name.clone(), port })
                })
                .collect(),
        }
    }
}

/// Reads the `port` key of a chopsticks YAML config.
pub fn read_fork_config_port(path: &Path) -> Option<u16> {
    let contents = std::fs::read_to_string(path).ok()?;
    let config: serde_yml::Value = serde_yml::from_str(&contents).ok()?;
    config.get("port")?.as_u64().and_then(|port| u16::try_from(port).ok())
}

pub fn port_from_url(url: &str) -> Option<u16> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?;
    let (_, port) = authority.rsplit_once(':')?;
    port.parse().ok()
}
