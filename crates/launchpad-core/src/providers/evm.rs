use alloy::providers::{Provider, ProviderBuilder, RootProvider, WsConnect};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvmClientError {
    #[error("unable to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("provider disconnected")]
    Disconnected,
    #[error("request failed: {0}")]
    Transport(String),
}

/// EVM-compatible client over a websocket transport.
pub struct EvmClient {
    provider: Option<RootProvider>,
}

impl EvmClient {
    pub async fn connect(endpoint: &str) -> Result<Self, EvmClientError> {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .on_ws(WsConnect::new(endpoint))
            .await
            .map_err(|e| EvmClientError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(EvmClient { provider: Some(provider) })
    }

    pub async fn chain_id(&self) -> Result<u64, EvmClientError> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(EvmClientError::Disconnected);
        };
        provider.get_chain_id().await.map_err(|e| EvmClientError::Transport(e.to_string()))
    }

    /// Drops the pubsub connection. Calling it again does nothing.
    pub fn disconnect(&mut self) {
        self.provider.take();
    }
}
