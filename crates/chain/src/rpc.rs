//! Typed JSON-RPC client for deployment execution.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::fees::NetworkFees;

/// Priority fee used when the node does not answer
/// `eth_maxPriorityFeePerGas` (1 gwei).
const DEFAULT_PRIORITY_FEE_WEI: u128 = 1_000_000_000;

/// Block tag for state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockId::latest(),
            BlockTag::Pending => BlockId::pending(),
            BlockTag::Number(number) => BlockId::number(number),
        }
    }
}

/// Minimal view of the chain head.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Base fee of the block, absent on pre-EIP-1559 chains.
    pub base_fee_per_gas: Option<u64>,
}

/// Result of an `eth_call` simulation.
///
/// Carries the raw return or revert payload; decoding is the caller's
/// responsibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallResult {
    /// Returned or reverted data.
    pub return_data: Bytes,
    /// Whether the call reverted.
    pub reverted: bool,
}

/// A transaction the node still knows about, in the mempool or mined.
#[derive(Debug, Clone, Copy)]
pub struct TransactionStatus {
    pub hash: B256,
    /// Block the transaction was mined in, if any.
    pub block_number: Option<u64>,
}

/// Thin, typed surface over a JSON-RPC endpoint.
///
/// Every method can fail with a transport-level error; callers treat those
/// as transient and retry at their own pace.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Latest block header.
    async fn get_latest_block(&self) -> Result<BlockHeader>;

    /// Transaction count for `sender` at the given block tag.
    async fn get_transaction_count(&self, sender: Address, tag: BlockTag) -> Result<u64>;

    /// Look up a transaction by hash. `None` means the transaction is not
    /// currently known to this node's mempool or recent chain.
    async fn get_transaction(&self, hash: B256) -> Result<Option<TransactionStatus>>;

    /// Simulate `tx` against the state at `tag`.
    async fn call(&self, tx: &TransactionRequest, tag: BlockTag) -> Result<RawCallResult>;

    /// Estimate the gas limit for `tx`. Fails when the transaction would
    /// revert or funds are insufficient; the error message carries the
    /// node's diagnostic string.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    /// Fee recommendation in the market the node currently prefers.
    async fn get_network_fees(&self) -> Result<NetworkFees>;

    /// Broadcast `tx`. Signing is delegated to the node.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256>;
}

/// `RpcClient` over an HTTP JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    url: String,
    priority_fee_fallback: u128,
}

impl HttpRpcClient {
    /// Create a client for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            priority_fee_fallback: DEFAULT_PRIORITY_FEE_WEI,
        }
    }

    /// Override the priority fee used when the node does not suggest one.
    pub fn with_priority_fee_fallback(mut self, wei: u128) -> Self {
        self.priority_fee_fallback = wei;
        self
    }

    /// Get the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Verify the endpoint is reachable.
    pub async fn health_check(&self) -> Result<u64> {
        let block = self.get_latest_block().await?;
        debug!(block = block.number, "RPC health check passed");
        Ok(block.number)
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn get_latest_block(&self) -> Result<BlockHeader> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("node returned no latest block")?;
        Ok(BlockHeader {
            number: block.header.number,
            base_fee_per_gas: block.header.base_fee_per_gas,
        })
    }

    async fn get_transaction_count(&self, sender: Address, tag: BlockTag) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let count = provider
            .get_transaction_count(sender)
            .block_id(tag.into())
            .await?;
        trace!(sender = %sender, ?tag, count, "fetched transaction count");
        Ok(count)
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<TransactionStatus>> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let tx = provider.get_transaction_by_hash(hash).await?;
        Ok(tx.map(|tx| TransactionStatus {
            hash,
            block_number: tx.block_number,
        }))
    }

    async fn call(&self, tx: &TransactionRequest, tag: BlockTag) -> Result<RawCallResult> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        match provider.call(tx.clone()).block(tag.into()).await {
            Ok(return_data) => Ok(RawCallResult {
                return_data,
                reverted: false,
            }),
            Err(err) => {
                if let Some(payload) = err.as_error_resp() {
                    if let Some(return_data) = payload.as_revert_data() {
                        return Ok(RawCallResult {
                            return_data,
                            reverted: true,
                        });
                    }
                    if payload.message.contains("revert") {
                        return Ok(RawCallResult {
                            return_data: Bytes::new(),
                            reverted: true,
                        });
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let gas = provider.estimate_gas(tx.clone()).await?;
        Ok(gas)
    }

    async fn get_network_fees(&self) -> Result<NetworkFees> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("node returned no latest block")?;

        match block.header.base_fee_per_gas {
            Some(base_fee) => {
                // The node advertises EIP-1559. Leave headroom for two full
                // base fee increases on top of the tip.
                let priority_fee = provider
                    .get_max_priority_fee_per_gas()
                    .await
                    .unwrap_or(self.priority_fee_fallback);
                let max_fee = 2 * base_fee as u128 + priority_fee;
                debug!(base_fee, priority_fee, max_fee, "EIP-1559 fee recommendation");
                Ok(NetworkFees::Eip1559 {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority_fee,
                })
            }
            None => {
                let gas_price = provider.get_gas_price().await?;
                debug!(gas_price, "legacy fee recommendation");
                Ok(NetworkFees::Legacy { gas_price })
            }
        }
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let pending = provider.send_transaction(tx.clone()).await?;
        let hash = *pending.tx_hash();
        debug!(hash = %hash, "transaction accepted by node");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag_conversion() {
        assert_eq!(BlockId::from(BlockTag::Latest), BlockId::latest());
        assert_eq!(BlockId::from(BlockTag::Pending), BlockId::pending());
        assert_eq!(BlockId::from(BlockTag::Number(42)), BlockId::number(42));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_latest_block_query() {
        let client = HttpRpcClient::new("https://eth.llamarpc.com");
        let block = client.get_latest_block().await.unwrap();
        assert!(block.number > 0);
    }
}
