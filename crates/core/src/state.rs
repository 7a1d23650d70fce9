//! Deployment execution state: interactions, broadcast records, and the
//! per-future state machine the engine drives.

use alloy::primitives::{Address, Bytes, B256, U256};
use anyhow::{anyhow, Result};
use deploykit_chain::NetworkFees;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::module::FutureKind;
use crate::nonce_sync::NonceSyncEvent;

/// One broadcast attempt for an on-chain interaction. Immutable once
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub hash: B256,
    pub fees: NetworkFees,
}

/// A logical on-chain action whose identity persists across broadcast
/// attempts.
///
/// Invariants: every record in `transactions` was sent at the same nonce,
/// and each record's fees are strictly higher than its predecessor's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnchainInteraction {
    /// Unique within one execution state.
    pub id: u64,
    pub from: Address,
    /// `None` means contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
    /// Set by the first send attempt, immutable afterwards.
    pub nonce: Option<u64>,
    /// One record per (re)send.
    pub transactions: SmallVec<[TransactionRecord; 1]>,
}

impl OnchainInteraction {
    pub fn new(id: u64, from: Address, to: Option<Address>, data: Bytes, value: U256) -> Self {
        Self {
            id,
            from,
            to,
            data,
            value,
            nonce: None,
            transactions: SmallVec::new(),
        }
    }

    /// Fees of the latest broadcast attempt, if any.
    pub fn last_fees(&self) -> Option<&NetworkFees> {
        self.transactions.last().map(|record| &record.fees)
    }

    /// Hashes of every broadcast attempt.
    pub fn transaction_hashes(&self) -> Vec<B256> {
        self.transactions.iter().map(|record| record.hash).collect()
    }
}

/// Lifecycle of one execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
    Started,
    Running,
    Success,
    TimedOut,
    Failed,
}

/// Per-future execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Matches the id of the future this state executes.
    pub id: String,
    pub kind: FutureKind,
    pub status: ExecutionStatus,
    pub from: Address,
    /// Interactions in creation order; the last one is the one still
    /// being driven.
    pub interactions: Vec<OnchainInteraction>,
}

impl ExecutionState {
    pub fn new(id: impl Into<String>, kind: FutureKind, from: Address) -> Self {
        Self {
            id: id.into(),
            kind,
            status: ExecutionStatus::Started,
            from,
            interactions: Vec::new(),
        }
    }

    /// The interaction still being driven to completion, if any.
    pub fn pending_interaction(&self) -> Option<&OnchainInteraction> {
        if self.status == ExecutionStatus::Success {
            return None;
        }
        self.interactions.last()
    }

    pub fn interaction_mut(&mut self, id: u64) -> Option<&mut OnchainInteraction> {
        self.interactions
            .iter_mut()
            .find(|interaction| interaction.id == id)
    }
}

/// All execution states of one deployment, keyed by future id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    states: BTreeMap<String, ExecutionState>,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: ExecutionState) {
        self.states.insert(state.id.clone(), state);
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionState> {
        self.states.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ExecutionState> {
        self.states.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionState> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Apply a sync event.
    ///
    /// A dropped interaction keeps its nonce and loses its broadcast
    /// records; the pipeline resends it at the same nonce. A replaced
    /// interaction is removed wholesale; the planner allocates a fresh one
    /// with a new nonce.
    pub fn apply(&mut self, event: &NonceSyncEvent) -> Result<()> {
        match event {
            NonceSyncEvent::OnchainInteractionDropped {
                future_id,
                network_interaction_id,
            } => {
                let interaction = self
                    .interaction_for_event(future_id, *network_interaction_id)?
                    .ok_or_else(|| {
                        anyhow!(
                            "no interaction {network_interaction_id} in execution state '{future_id}'"
                        )
                    })?;
                interaction.transactions.clear();
            }
            NonceSyncEvent::OnchainInteractionReplacedByUser {
                future_id,
                network_interaction_id,
            } => {
                let state = self
                    .states
                    .get_mut(future_id)
                    .ok_or_else(|| anyhow!("unknown execution state '{future_id}'"))?;
                state
                    .interactions
                    .retain(|interaction| interaction.id != *network_interaction_id);
            }
        }
        Ok(())
    }

    fn interaction_for_event(
        &mut self,
        future_id: &str,
        interaction_id: u64,
    ) -> Result<Option<&mut OnchainInteraction>> {
        let state = self
            .states
            .get_mut(future_id)
            .ok_or_else(|| anyhow!("unknown execution state '{future_id}'"))?;
        Ok(state.interaction_mut(interaction_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256};

    const SENDER: Address = address!("1111111111111111111111111111111111111111");

    fn interaction_with_send(id: u64, nonce: u64) -> OnchainInteraction {
        let mut interaction =
            OnchainInteraction::new(id, SENDER, Some(Address::ZERO), Bytes::new(), U256::ZERO);
        interaction.nonce = Some(nonce);
        interaction.transactions.push(TransactionRecord {
            hash: b256!("00000000000000000000000000000000000000000000000000000000000000aa"),
            fees: NetworkFees::Legacy { gas_price: 10 },
        });
        interaction
    }

    #[test]
    fn test_pending_interaction_hidden_after_success() {
        let mut state =
            ExecutionState::new("m#c", FutureKind::ContractDeployment, SENDER);
        state.interactions.push(interaction_with_send(1, 5));
        assert!(state.pending_interaction().is_some());

        state.status = ExecutionStatus::Success;
        assert!(state.pending_interaction().is_none());
    }

    #[test]
    fn test_apply_dropped_clears_records_and_keeps_nonce() {
        let mut deployment = DeploymentState::new();
        let mut state = ExecutionState::new("m#c", FutureKind::ContractCall, SENDER);
        state.interactions.push(interaction_with_send(1, 5));
        deployment.insert(state);

        deployment
            .apply(&NonceSyncEvent::OnchainInteractionDropped {
                future_id: "m#c".into(),
                network_interaction_id: 1,
            })
            .unwrap();

        let interaction = &deployment.get("m#c").unwrap().interactions[0];
        assert_eq!(interaction.nonce, Some(5));
        assert!(interaction.transactions.is_empty());
    }

    #[test]
    fn test_apply_replaced_removes_interaction() {
        let mut deployment = DeploymentState::new();
        let mut state = ExecutionState::new("m#c", FutureKind::ContractCall, SENDER);
        state.interactions.push(interaction_with_send(1, 5));
        deployment.insert(state);

        deployment
            .apply(&NonceSyncEvent::OnchainInteractionReplacedByUser {
                future_id: "m#c".into(),
                network_interaction_id: 1,
            })
            .unwrap();

        assert!(deployment.get("m#c").unwrap().interactions.is_empty());
    }

    #[test]
    fn test_apply_to_unknown_state_is_an_error() {
        let mut deployment = DeploymentState::new();
        let result = deployment.apply(&NonceSyncEvent::OnchainInteractionDropped {
            future_id: "m#missing".into(),
            network_interaction_id: 1,
        });
        assert!(result.is_err());
    }
}
