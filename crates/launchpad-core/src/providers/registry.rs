use std::time::Duration;

use hiro_system_kit::slog;
use serde_json::Value;

use super::{ChainIdentity, ChainRpcClient, CreatedBlock, PreparedProvider, ProviderClient};
use crate::types::{LaunchpadError, LaunchpadErrorExt, LaunchpadResult, ProviderKind};
use crate::utils::Context;

/// A connected provider with a uniform lifecycle.
pub struct ProviderHandle {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    client: ProviderClient,
    connected: bool,
}

/// Connects a prepared provider, bounded by `limit`.
pub async fn populate(
    prepared: PreparedProvider,
    limit: Duration,
    ctx: &Context,
) -> LaunchpadResult<ProviderHandle> {
    let client = match tokio::time::timeout(limit, prepared.connect()).await {
        Ok(client) => client?,
        Err(_) => {
            return Err(launchpad_error!(
                LaunchpadError::ProviderTimeout,
                "no connection after {} ms",
                limit.as_millis()
            ))
            .with_provider_info(
                prepared.name.as_str(),
                prepared.kind.to_string(),
                prepared.endpoint.as_str(),
            )
        }
    };
    ctx.try_log(|logger| {
        slog::info!(
            logger,
            "provider {} ({}) connected to {}",
            prepared.name,
            prepared.kind,
            prepared.endpoint
        )
    });
    Ok(ProviderHandle {
        name: prepared.name,
        kind: prepared.kind,
        endpoint: prepared.endpoint,
        client,
        connected: true,
    })
}

impl ProviderHandle {
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Probes chain identity; EVM-compatible clients only log their chain id.
    pub async fn greet(&self, ctx: &Context) -> LaunchpadResult<Option<ChainIdentity>> {
        match &self.client {
            ProviderClient::Chain(client) => {
                let identity = client.runtime_version().await.map_err(|e| {
                    launchpad_error!(LaunchpadError::ProviderUnreachable, "greeting failed: {}", e)
                });
                let identity = self.with_info(identity)?;
                ctx.try_log(|logger| {
                    slog::info!(
                        logger,
                        "{} is connected to {} rt{}",
                        self.name,
                        identity.name,
                        identity.version
                    )
                });
                Ok(Some(identity))
            }
            ProviderClient::Evm(client) => {
                let chain_id = client.chain_id().await.map_err(|e| {
                    launchpad_error!(LaunchpadError::ProviderUnreachable, "greeting failed: {}", e)
                });
                let chain_id = self.with_info(chain_id)?;
                ctx.try_log(|logger| {
                    slog::info!(logger, "{} is connected to chain id {}", self.name, chain_id)
                });
                Ok(None)
            }
        }
    }

    /// Raw JSON-RPC request, available on generic and native providers.
    pub async fn request(&self, method: &str, params: Value) -> LaunchpadResult<Value> {
        let client = self.chain_client()?;
        let result = client.request(method, params).await.map_err(|e| {
            launchpad_error!(LaunchpadError::ProviderUnreachable, "{} failed: {}", method, e)
        });
        self.with_info(result)
    }

    /// Seals a block through the native `engine_createBlock` extension.
    pub async fn create_block(
        &self,
        create_empty: bool,
        finalize: bool,
    ) -> LaunchpadResult<CreatedBlock> {
        if self.kind != ProviderKind::Native {
            return self.with_info(Err(launchpad_error!(
                LaunchpadError::ConfigDefect,
                "block creation requires a native provider"
            )));
        }
        let client = self.chain_client()?;
        let block = client.create_block(create_empty, finalize).await.map_err(|e| {
            launchpad_error!(LaunchpadError::ProviderUnreachable, "engine_createBlock failed: {}", e)
        });
        self.with_info(block)
    }

    /// Releases the underlying connection. Calling it twice is a no-op.
    pub fn disconnect(&mut self, ctx: &Context) {
        if !self.connected {
            return;
        }
        match &mut self.client {
            ProviderClient::Chain(client) => client.disconnect(),
            ProviderClient::Evm(client) => client.disconnect(),
        }
        self.connected = false;
        ctx.try_log(|logger| slog::debug!(logger, "provider {} disconnected", self.name));
    }

    fn chain_client(&self) -> LaunchpadResult<&ChainRpcClient> {
        match &self.client {
            ProviderClient::Chain(client) if self.connected => Ok(client),
            ProviderClient::Chain(_) => self.with_info(Err(launchpad_error!(
                LaunchpadError::ProviderUnreachable,
                "provider disconnected"
            ))),
            ProviderClient::Evm(_) => self.with_info(Err(launchpad_error!(
                LaunchpadError::ConfigDefect,
                "raw chain requests are not available on {} providers",
                self.kind
            ))),
        }
    }

    fn with_info<T>(&self, result: LaunchpadResult<T>) -> LaunchpadResult<T> {
        result.with_provider_info(self.name.as_str(), self.kind.to_string(), self.endpoint.as_str())
    }
}
