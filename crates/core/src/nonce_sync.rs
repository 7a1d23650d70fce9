//! Nonce reconciliation between local pending transactions and the chain.
//!
//! Between runs (and between steps) the engine must find out what became
//! of every transaction it sent: still in the mempool, mined, dropped, or
//! replaced by a transaction the user sent from the same account. The
//! answer decides whether a nonce can be resent, must be abandoned, or
//! whether the whole pass has to wait for confirmations.

use alloy::primitives::{Address, B256};
use deploykit_chain::{BlockTag, RpcClient};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::error::ExecutionError;
use crate::module::PlannedFuture;
use crate::state::{DeploymentState, ExecutionStatus};

/// Reconciliation events. The caller applies them to the deployment state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum NonceSyncEvent {
    /// Every transaction sent for this interaction vanished from the node
    /// and nothing else took its nonce. Resend at the same nonce.
    OnchainInteractionDropped {
        future_id: String,
        network_interaction_id: u64,
    },
    /// A transaction the engine did not send confirmed at this
    /// interaction's nonce. The nonce is lost; a fresh interaction is
    /// needed.
    OnchainInteractionReplacedByUser {
        future_id: String,
        network_interaction_id: u64,
    },
}

/// One locally tracked nonce of a sender.
struct TrackedNonce {
    nonce: u64,
    tx_hashes: Vec<B256>,
    future_id: String,
    interaction_id: u64,
}

/// Reconciles locally tracked nonces with node-observed transaction
/// counts.
pub struct NonceSyncEngine {
    rpc: Arc<dyn RpcClient>,
}

impl NonceSyncEngine {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }

    /// Run one reconciliation pass.
    ///
    /// Senders are inspected concurrently, each against its own snapshot
    /// of `(latest block, safe count, pending count, latest count)`.
    /// Blocking errors abort the pass; the caller waits and re-runs.
    pub async fn sync(
        &self,
        state: &DeploymentState,
        futures: &[PlannedFuture],
        accounts: &[Address],
        default_sender: Address,
        required_confirmations: u64,
    ) -> Result<Vec<NonceSyncEvent>, ExecutionError> {
        let tracked = tracked_by_sender(state, futures, accounts, default_sender)?;
        debug!(
            senders = tracked.len(),
            required_confirmations, "starting nonce sync pass"
        );

        let passes: Vec<_> = tracked
            .iter()
            .map(|(sender, nonces)| self.sync_sender(*sender, nonces, required_confirmations))
            .collect();
        let events = try_join_all(passes).await?;
        Ok(events.into_iter().flatten().collect())
    }

    async fn sync_sender(
        &self,
        sender: Address,
        tracked: &[TrackedNonce],
        required_confirmations: u64,
    ) -> Result<Vec<NonceSyncEvent>, ExecutionError> {
        // One consistent snapshot per sender per pass.
        let block = self.rpc.get_latest_block().await?;
        let safe_block = (block.number + 1).checked_sub(required_confirmations);
        let safe_count = match safe_block {
            Some(number) => Some(
                self.rpc
                    .get_transaction_count(sender, BlockTag::Number(number))
                    .await?,
            ),
            None => None,
        };
        let pending_count = self
            .rpc
            .get_transaction_count(sender, BlockTag::Pending)
            .await?;
        let latest_count = self
            .rpc
            .get_transaction_count(sender, BlockTag::Latest)
            .await?;

        let has_unconfirmed = match safe_count {
            Some(safe_count) => safe_count != pending_count,
            None => pending_count > 0,
        };

        debug!(
            sender = %sender,
            block = block.number,
            ?safe_count,
            pending_count,
            latest_count,
            tracked = tracked.len(),
            "nonce sync snapshot"
        );

        if tracked.is_empty() {
            // Nothing of ours to reconcile, but outstanding user
            // transactions still gate our future nonce allocations.
            if has_unconfirmed {
                return Err(ExecutionError::WaitingForConfirmations {
                    sender,
                    required_confirmations,
                });
            }
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        for entry in tracked {
            if self.any_transaction_known(&entry.tx_hashes).await? {
                trace!(sender = %sender, nonce = entry.nonce, "interaction still live on the node");
                continue;
            }

            // Every transaction we sent at this nonce is gone from the
            // node. Decide between replaced and dropped.
            if latest_count > entry.nonce {
                // Something was mined at this nonce and it is not ours.
                if safe_count.is_some_and(|safe_count| safe_count > entry.nonce) {
                    info!(
                        sender = %sender,
                        nonce = entry.nonce,
                        future = %entry.future_id,
                        "interaction replaced by a confirmed user transaction"
                    );
                    events.push(NonceSyncEvent::OnchainInteractionReplacedByUser {
                        future_id: entry.future_id.clone(),
                        network_interaction_id: entry.interaction_id,
                    });
                } else {
                    return Err(ExecutionError::WaitingForNonce {
                        sender,
                        nonce: entry.nonce,
                        required_confirmations,
                    });
                }
            } else if pending_count > entry.nonce {
                // The user's replacement sits in the mempool, unconfirmed.
                return Err(ExecutionError::WaitingForNonce {
                    sender,
                    nonce: entry.nonce,
                    required_confirmations,
                });
            } else {
                info!(
                    sender = %sender,
                    nonce = entry.nonce,
                    future = %entry.future_id,
                    "interaction dropped from the mempool"
                );
                events.push(NonceSyncEvent::OnchainInteractionDropped {
                    future_id: entry.future_id.clone(),
                    network_interaction_id: entry.interaction_id,
                });
            }
        }

        // User transactions above our highest tracked nonce constrain the
        // nonces we will allocate next; wait until they are confirmed.
        if let Some(highest) = tracked.last() {
            if highest.nonce + 1 < pending_count && has_unconfirmed {
                return Err(ExecutionError::WaitingForNonce {
                    sender,
                    nonce: pending_count - 1,
                    required_confirmations,
                });
            }
        }

        Ok(events)
    }

    async fn any_transaction_known(&self, hashes: &[B256]) -> Result<bool, ExecutionError> {
        for hash in hashes {
            if self.rpc.get_transaction(*hash).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Build the per-sender lists of locally tracked nonces, sorted by nonce.
///
/// Also registers senders of futures the plan has not started yet: user
/// activity on those accounts blocks our future allocations just the same.
fn tracked_by_sender(
    state: &DeploymentState,
    futures: &[PlannedFuture],
    accounts: &[Address],
    default_sender: Address,
) -> Result<BTreeMap<Address, Vec<TrackedNonce>>, ExecutionError> {
    let mut tracked: BTreeMap<Address, Vec<TrackedNonce>> = BTreeMap::new();

    for exec in state.iter() {
        if !exec.kind.produces_onchain_transactions() {
            continue;
        }
        if exec.status == ExecutionStatus::Success {
            continue;
        }
        let Some(interaction) = exec.pending_interaction() else {
            continue;
        };
        let Some(nonce) = interaction.nonce else {
            continue;
        };
        let list = tracked.entry(exec.from).or_default();
        // A reserved nonce with no broadcast yet has nothing to
        // reconcile; the pipeline will (re)send it as-is.
        if interaction.transactions.is_empty() {
            continue;
        }
        list.push(TrackedNonce {
            nonce,
            tx_hashes: interaction.transaction_hashes(),
            future_id: exec.id.clone(),
            interaction_id: interaction.id,
        });
    }

    for future in futures {
        if state.contains(&future.id) {
            continue;
        }
        if let Some(sender) = future.resolve_sender(accounts, default_sender)? {
            tracked.entry(sender).or_default();
        }
    }

    for list in tracked.values_mut() {
        list.sort_by_key(|entry| entry.nonce);
    }
    Ok(tracked)
}
