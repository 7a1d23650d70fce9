//! Component wiring for an embedded deployment run.

use alloy::primitives::Address;
use deploykit_chain::{HttpRpcClient, RpcClient};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use crate::journal::ExecutionJournal;
use crate::module::PlannedFuture;
use crate::nonce::NonceAllocator;
use crate::nonce_sync::{NonceSyncEngine, NonceSyncEvent};
use crate::sender::{SendOutcome, TransactionSender};
use crate::simulation::SimulationDecoder;
use crate::state::{DeploymentState, OnchainInteraction};

/// Owns the execution components of one deployment run and keeps their
/// shared surfaces (nonce counters, journal) consistent.
pub struct DeploymentExecutor {
    rpc: Arc<dyn RpcClient>,
    nonces: NonceAllocator,
    sender: TransactionSender,
    sync: NonceSyncEngine,
    journal: Arc<dyn ExecutionJournal>,
    config: ExecutionConfig,
}

impl DeploymentExecutor {
    /// Wire the executor against the configured HTTP endpoint.
    pub fn new(config: ExecutionConfig, journal: Arc<dyn ExecutionJournal>) -> Self {
        let rpc: Arc<dyn RpcClient> = Arc::new(
            HttpRpcClient::new(config.rpc_url.clone())
                .with_priority_fee_fallback(config.priority_fee_wei),
        );
        Self::with_rpc(rpc, config, journal)
    }

    /// Wire against an explicit RPC client (custom transports, tests).
    pub fn with_rpc(
        rpc: Arc<dyn RpcClient>,
        config: ExecutionConfig,
        journal: Arc<dyn ExecutionJournal>,
    ) -> Self {
        info!(
            required_confirmations = config.required_confirmations,
            "initializing deployment executor"
        );
        Self {
            nonces: NonceAllocator::new(Arc::clone(&rpc)),
            sender: TransactionSender::new(Arc::clone(&rpc)),
            sync: NonceSyncEngine::new(Arc::clone(&rpc)),
            rpc,
            journal,
            config,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn rpc(&self) -> &Arc<dyn RpcClient> {
        &self.rpc
    }

    /// Send (or resend) the transaction for one interaction.
    pub async fn send_for(
        &self,
        interaction: &mut OnchainInteraction,
        sender: Address,
        decoder: &dyn SimulationDecoder,
        future_id: &str,
    ) -> Result<SendOutcome, ExecutionError> {
        self.sender
            .send_for(
                interaction,
                sender,
                &self.nonces,
                decoder,
                self.journal.as_ref(),
                future_id,
            )
            .await
    }

    /// Run a reconciliation pass and apply its events to `state`.
    ///
    /// Nonce counters of affected senders are resynced afterwards, so a
    /// fresh interaction created in response to a replacement starts past
    /// the user's transactions.
    pub async fn sync_nonces(
        &self,
        state: &mut DeploymentState,
        futures: &[PlannedFuture],
        accounts: &[Address],
        default_sender: Address,
    ) -> Result<Vec<NonceSyncEvent>, ExecutionError> {
        let events = self
            .sync
            .sync(
                state,
                futures,
                accounts,
                default_sender,
                self.config.required_confirmations,
            )
            .await?;

        let mut touched = BTreeSet::new();
        for event in &events {
            let future_id = match event {
                NonceSyncEvent::OnchainInteractionDropped { future_id, .. } => future_id,
                NonceSyncEvent::OnchainInteractionReplacedByUser { future_id, .. } => future_id,
            };
            if let Some(exec) = state.get(future_id) {
                touched.insert(exec.from);
            }
        }

        for event in &events {
            state.apply(event)?;
        }
        for sender in touched {
            self.nonces.resync(sender).await?;
        }

        debug!(events = events.len(), "nonce sync pass applied");
        Ok(events)
    }
}
