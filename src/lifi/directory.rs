use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{EvmRpc, LifiClient, LifiError};
use crate::error::DirectoryError;
use crate::model::{
    ChainDescriptor, ChainType, DESTINATION_CHAIN_ID, DESTINATION_RPC_URL, TokenDescriptor,
};
use crate::services::{ChainDirectory, TokenDirectory, is_valid_evm_address, with_cancel};

/// Tokens per JSON-RPC batch. Public RPCs commonly cap batches at 100.
const BALANCE_BATCH_SIZE: usize = 100;

/// Chain and token directory backed by LI.FI, with balances read over RPC.
pub struct LifiDirectory {
    client: Arc<LifiClient>,
    rpc: EvmRpc,
    rpc_overrides: HashMap<u64, String>,
    chains: RwLock<HashMap<u64, ChainDescriptor>>,
}

impl LifiDirectory {
    pub fn new(client: Arc<LifiClient>, rpc: EvmRpc, rpc_overrides: HashMap<u64, String>) -> Self {
        Self {
            client,
            rpc,
            rpc_overrides,
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a chain, fetching the chain list once if it isn't cached.
    pub async fn chain(&self, chain_id: u64) -> Result<Option<ChainDescriptor>, LifiError> {
        if let Some(chain) = self.chains.read().await.get(&chain_id) {
            return Ok(Some(chain.clone()));
        }
        let chains = self.client.chains(&ChainType::SOURCE_TYPES).await?;
        let mut cache = self.chains.write().await;
        for chain in chains {
            cache.insert(chain.id, chain);
        }
        Ok(cache.get(&chain_id).cloned())
    }

    /// RPC endpoint for an EVM chain: configured override, else chain metadata.
    pub async fn rpc_url(&self, chain_id: u64) -> Option<String> {
        if let Some(url) = self.rpc_overrides.get(&chain_id) {
            return Some(url.clone());
        }
        match self.chain(chain_id).await {
            Ok(Some(chain)) => chain.rpc_url().map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(chain_id, "Chain lookup failed: {}", e);
                (chain_id == DESTINATION_CHAIN_ID).then(|| DESTINATION_RPC_URL.to_string())
            }
        }
    }

    pub fn rpc(&self) -> &EvmRpc {
        &self.rpc
    }

    async fn balances_for_chain(
        &self,
        chain_id: u64,
        address: &str,
        tokens: &[TokenDescriptor],
    ) -> Result<Vec<Option<u128>>, DirectoryError> {
        let unavailable = |reason: String| DirectoryError::BalancesUnavailable { chain_id, reason };

        match self.chain(chain_id).await {
            Ok(Some(chain)) if chain.chain_type != ChainType::Evm => {
                return Err(unavailable(format!(
                    "{} chains are not supported",
                    chain.chain_type.as_str()
                )));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(chain_id, "Chain lookup failed: {}", e),
        }
        if !is_valid_evm_address(address) {
            return Err(unavailable(format!("'{address}' is not an EVM address")));
        }
        let url = self
            .rpc_url(chain_id)
            .await
            .ok_or_else(|| unavailable("no RPC endpoint is known".to_string()))?;

        let batches = tokens
            .chunks(BALANCE_BATCH_SIZE)
            .map(|chunk| self.rpc.balances(&url, address, chunk));
        let mut balances = Vec::with_capacity(tokens.len());
        for result in join_all(batches).await {
            balances.extend(result.map_err(|e| unavailable(e.to_string()))?);
        }
        Ok(balances)
    }
}

#[async_trait]
impl ChainDirectory for LifiDirectory {
    async fn list_chains(
        &self,
        chain_types: &[ChainType],
        cancel: &CancellationToken,
    ) -> Result<Vec<ChainDescriptor>, DirectoryError> {
        let chains = with_cancel(cancel, self.client.chains(chain_types))
            .await
            .ok_or(DirectoryError::Cancelled)?
            .map_err(|e| e.into_directory("chains"))?;

        let mut cache = self.chains.write().await;
        for chain in &chains {
            cache.insert(chain.id, chain.clone());
        }
        tracing::debug!(count = chains.len(), "Loaded chains");
        Ok(chains)
    }
}

#[async_trait]
impl TokenDirectory for LifiDirectory {
    async fn list_tokens(
        &self,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError> {
        let tokens = with_cancel(cancel, self.client.tokens(chain_id))
            .await
            .ok_or(DirectoryError::Cancelled)?
            .map_err(|e| e.into_directory("tokens"))?;
        tracing::debug!(chain_id, count = tokens.len(), "Loaded tokens");
        Ok(tokens)
    }

    async fn list_balances(
        &self,
        address: &str,
        mut tokens: Vec<TokenDescriptor>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError> {
        let mut by_chain: HashMap<u64, Vec<usize>> = HashMap::new();
        for (index, token) in tokens.iter().enumerate() {
            by_chain.entry(token.chain_id).or_default().push(index);
        }

        for (chain_id, indexes) in by_chain {
            let chain_tokens: Vec<TokenDescriptor> =
                indexes.iter().map(|&i| tokens[i].clone()).collect();
            let balances = with_cancel(
                cancel,
                self.balances_for_chain(chain_id, address, &chain_tokens),
            )
            .await
            .ok_or(DirectoryError::Cancelled)??;
            for (index, balance) in indexes.into_iter().zip(balances) {
                tokens[index].balance = balance;
            }
        }
        Ok(tokens)
    }
}
