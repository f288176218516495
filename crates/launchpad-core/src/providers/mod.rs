//! Provider factory: turns declarations into prepared, not yet connected, providers.

use crate::types::{
    LaunchpadError, LaunchpadErrorExt, LaunchpadResult, ProviderDeclaration, ProviderKind,
    ENV_SUPPLIED_ENDPOINT,
};

pub mod chain_rpc;
pub mod evm;
pub mod registry;

pub use chain_rpc::{ChainIdentity, ChainRpcClient, ChainRpcError, CreatedBlock};
pub use evm::{EvmClient, EvmClientError};
pub use registry::{populate, ProviderHandle};

pub enum ProviderClient {
    Chain(ChainRpcClient),
    Evm(EvmClient),
}

/// A provider whose endpoint is resolved but which has not performed any I/O yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProvider {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
}

impl PreparedProvider {
    pub async fn connect(&self) -> LaunchpadResult<ProviderClient> {
        let client = match self.kind {
            ProviderKind::Generic | ProviderKind::Native => ChainRpcClient::connect(&self.endpoint)
                .await
                .map(ProviderClient::Chain)
                .map_err(|e| e.to_string()),
            ProviderKind::Evm | ProviderKind::EventLog => EvmClient::connect(&self.endpoint)
                .await
                .map(ProviderClient::Evm)
                .map_err(|e| e.to_string()),
        };
        client
            .map_err(|e| {
                launchpad_error!(LaunchpadError::ProviderUnreachable, "{}", e)
            })
            .with_provider_info(self.name.as_str(), self.kind.to_string(), self.endpoint.as_str())
    }
}

/// Resolves the endpoint of a declaration; `ENV_VAR` endpoints read `wss_url` instead.
pub fn prepare(
    declaration: &ProviderDeclaration,
    wss_url: Option<&str>,
) -> LaunchpadResult<PreparedProvider> {
    let endpoint = match declaration.endpoints.first().map(String::as_str) {
        Some(ENV_SUPPLIED_ENDPOINT) => wss_url.map(str::to_string),
        Some(endpoint) => Some(endpoint.to_string()),
        None => None,
    };
    match endpoint {
        Some(endpoint) => Ok(PreparedProvider {
            name: declaration.name.clone(),
            kind: declaration.kind,
            endpoint,
        }),
        None => Err(launchpad_error!(
            LaunchpadError::ConfigDefect,
            "no endpoint available for provider '{}'",
            declaration.name
        ))
        .with_provider_info(
            declaration.name.as_str(),
            declaration.kind.to_string(),
            declaration.endpoints.join(", "),
        ),
    }
}
