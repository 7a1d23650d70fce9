//! Per-sender nonce allocation.
//!
//! The first allocation for a sender seeds a local counter from the node's
//! `pending` transaction count, so transactions already sitting in the
//! mempool are never double-assigned. Later allocations increment the
//! counter locally without touching the network.

use alloy::primitives::Address;
use dashmap::DashMap;
use deploykit_chain::{BlockTag, RpcClient};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Hands out the next unused nonce for each sender.
///
/// Handing out a nonce is bookkeeping only; the reservation completes when
/// the send pipeline writes the nonce onto an interaction. The counter is
/// monotone for the lifetime of the allocator.
pub struct NonceAllocator {
    rpc: Arc<dyn RpcClient>,
    /// Next nonce per sender. `None` until seeded from the node.
    next: DashMap<Address, Arc<Mutex<Option<u64>>>>,
}

impl NonceAllocator {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self {
            rpc,
            next: DashMap::new(),
        }
    }

    /// Next unused nonce for `sender`.
    pub async fn get_next_nonce(&self, sender: Address) -> anyhow::Result<u64> {
        // Clone the slot out so the map lock is not held across the await.
        let slot = Arc::clone(self.next.entry(sender).or_default().value());
        let mut next = slot.lock().await;

        let nonce = match *next {
            Some(nonce) => nonce,
            None => {
                let pending = self
                    .rpc
                    .get_transaction_count(sender, BlockTag::Pending)
                    .await?;
                trace!(sender = %sender, pending, "seeded nonce counter from pending count");
                pending
            }
        };
        *next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Re-read the pending count and advance the counter if the chain
    /// moved ahead, e.g. after user transactions were reconciled. Never
    /// rewinds: nonces already handed out stay reserved.
    pub async fn resync(&self, sender: Address) -> anyhow::Result<()> {
        let slot = Arc::clone(self.next.entry(sender).or_default().value());
        let mut next = slot.lock().await;

        let pending = self
            .rpc
            .get_transaction_count(sender, BlockTag::Pending)
            .await?;
        match *next {
            Some(current) if pending > current => {
                debug!(sender = %sender, current, pending, "advanced nonce counter to pending count");
                *next = Some(pending);
            }
            None => *next = Some(pending),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRpc;
    use alloy::primitives::address;

    const SENDER: Address = address!("1111111111111111111111111111111111111111");

    #[tokio::test]
    async fn test_seeds_from_pending_count_then_counts_locally() {
        let rpc = Arc::new(MockRpc::default());
        rpc.set_pending_count(SENDER, 5);

        let allocator = NonceAllocator::new(rpc.clone());
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 5);
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 6);
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 7);

        // Only the first allocation hits the node.
        assert_eq!(
            rpc.log_entries()
                .iter()
                .filter(|line| line.starts_with("get_transaction_count"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_resync_advances_but_never_rewinds() {
        let rpc = Arc::new(MockRpc::default());
        rpc.set_pending_count(SENDER, 5);

        let allocator = NonceAllocator::new(rpc.clone());
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 5);
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 6);

        // User transactions landed: the pending count jumped past us.
        rpc.set_pending_count(SENDER, 9);
        allocator.resync(SENDER).await.unwrap();
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 9);

        // A lower pending count must not reclaim handed-out nonces.
        rpc.set_pending_count(SENDER, 3);
        allocator.resync(SENDER).await.unwrap();
        assert_eq!(allocator.get_next_nonce(SENDER).await.unwrap(), 10);
    }
}
