use std::fmt;

use serde_derive::{Deserialize, Serialize};

use super::errors::{LaunchpadError, LaunchpadErrorExt, LaunchpadResult};

pub const DEFAULT_CONFIG_FILE: &str = "launchpad.config.json";
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_INCLUDE_PATTERN: &str = "**/{test,spec,test_,test-}*{ts,mts,cts}";

/// Endpoint placeholder resolved from `WSS_URL` at preparation time.
pub const ENV_SUPPLIED_ENDPOINT: &str = "ENV_VAR";

fn default_test_timeout() -> u64 {
    DEFAULT_TEST_TIMEOUT_MS
}

fn default_launch_timeout() -> u64 {
    DEFAULT_LAUNCH_TIMEOUT_MS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    pub label: String,
    #[serde(default = "default_test_timeout")]
    pub default_test_timeout: u64,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default)]
    pub test_runner: TestRunnerConfig,
    pub environments: Vec<Environment>,
}

impl GlobalConfig {
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.iter().map(|env| env.name.clone()).collect()
    }

    pub fn environment(&self, name: &str) -> LaunchpadResult<&Environment> {
        match self.environments.iter().find(|env| env.name == name) {
            Some(env) => Ok(env),
            None => Err(launchpad_error!(
                LaunchpadError::EnvironmentNotFound,
                "environment '{}' unknown from config",
                name
            ))
            .with_environment_info(name, self.environment_names()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRunnerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub results_cache: String,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        TestRunnerConfig {
            command: "npx".into(),
            args: vec!["vitest".into(), "run".into()],
            results_cache: "node_modules/.vite/vitest/results.json".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    pub description: Option<String>,
    pub foundation: FoundationSpec,
    #[serde(default)]
    pub connections: Vec<ProviderDeclaration>,
    #[serde(default)]
    pub test_file_dir: Vec<String>,
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub multi_threads: bool,
    #[serde(default)]
    pub html: bool,
    pub timeout: Option<u64>,
}

impl Environment {
    pub fn include_patterns(&self) -> Vec<String> {
        match &self.include {
            Some(patterns) if !patterns.is_empty() => patterns.clone(),
            _ => vec![DEFAULT_INCLUDE_PATTERN.to_string()],
        }
    }
}

/// The kind of network backing an environment, with only the fields that kind uses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FoundationSpec {
    Dev(DevLaunchSpec),
    SimulatedFork(ForkFoundationSpec),
    SimulatedTopology(TopologySpec),
    ReadOnly,
}

impl FoundationSpec {
    pub fn kind(&self) -> FoundationKind {
        match self {
            FoundationSpec::Dev(_) => FoundationKind::Dev,
            FoundationSpec::SimulatedFork(_) => FoundationKind::SimulatedFork,
            FoundationSpec::SimulatedTopology(_) => FoundationKind::SimulatedTopology,
            FoundationSpec::ReadOnly => FoundationKind::ReadOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundationKind {
    Dev,
    SimulatedFork,
    SimulatedTopology,
    ReadOnly,
}

impl fmt::Display for FoundationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoundationKind::Dev => write!(f, "dev"),
            FoundationKind::SimulatedFork => write!(f, "simulated_fork"),
            FoundationKind::SimulatedTopology => write!(f, "simulated_topology"),
            FoundationKind::ReadOnly => write!(f, "read_only"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DevLaunchSpec {
    pub name: Option<String>,
    pub bin_path: String,
    /// Replaces the baseline arguments entirely when present.
    pub options: Option<Vec<String>>,
    pub ports: Option<PortOverrides>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortOverrides {
    pub p2p_port: Option<u16>,
    pub rpc_port: Option<u16>,
    pub ws_port: Option<u16>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForkFoundationSpec {
    /// Simulator entry point, the locally installed chopsticks shim when absent.
    pub bin_path: Option<String>,
    pub chains: Vec<ForkLaunchSpec>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForkLaunchSpec {
    pub name: Option<String>,
    pub config_path: String,
    pub port: Option<u16>,
    pub build_block_mode: Option<BuildBlockMode>,
    pub wasm_override: Option<String>,
    pub role: Option<ChainRole>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildBlockMode {
    Batch,
    Instant,
    #[default]
    Manual,
}

impl BuildBlockMode {
    pub fn code(&self) -> u8 {
        match self {
            BuildBlockMode::Batch => 0,
            BuildBlockMode::Instant => 1,
            BuildBlockMode::Manual => 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainRole {
    #[serde(rename = "relaychain", alias = "relay")]
    Relaychain,
    #[default]
    #[serde(rename = "parachain")]
    Parachain,
}

impl ChainRole {
    pub fn flag(&self) -> &'static str {
        match self {
            ChainRole::Relaychain => "--relaychain",
            ChainRole::Parachain => "--parachain",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologySpec {
    /// Coordinator binary, `zombienet` from the path when absent.
    pub bin_path: Option<String>,
    pub chains: Vec<TopologyChain>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyChain {
    pub name: String,
    pub role: ChainRole,
    pub config_path: String,
    pub ws_port: Option<u16>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Generic chain client
    #[serde(rename = "generic", alias = "polkadotJs")]
    Generic,
    /// Chain client with the node's custom RPC extensions
    #[serde(rename = "native", alias = "moon")]
    Native,
    /// EVM-compatible client
    #[serde(rename = "evm", alias = "ethers")]
    Evm,
    /// Event-log client
    #[serde(rename = "event_log", alias = "web3")]
    EventLog,
}

impl ProviderKind {
    /// Kinds answering the `state_getRuntimeVersion` identity probe.
    pub fn exposes_chain_identity(&self) -> bool {
        matches!(self, ProviderKind::Generic | ProviderKind::Native)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Generic => write!(f, "generic"),
            ProviderKind::Native => write!(f, "native"),
            ProviderKind::Evm => write!(f, "evm"),
            ProviderKind::EventLog => write!(f, "event_log"),
        }
    }
}
