//! Send pipeline for on-chain interactions.
//!
//! Drives one interaction through nonce acquisition, fee computation, gas
//! estimation, pre-send simulation, intent journaling, and broadcast.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxKind, B256};
use alloy::rpc::types::TransactionRequest;
use deploykit_chain::{next_fees, BlockTag, NetworkFees, RpcClient};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;
use crate::journal::{ExecutionJournal, JournalEntry};
use crate::nonce::NonceAllocator;
use crate::quirks::{classify_estimation_failure, EstimationFailureKind};
use crate::simulation::{SimulationDecoder, SimulationFailure};
use crate::state::{OnchainInteraction, TransactionRecord};

/// A successfully broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: B256,
    pub nonce: u64,
    pub fees: NetworkFees,
}

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transaction was broadcast and recorded on the interaction.
    Sent(SentTransaction),
    /// Pre-send simulation decoded to a failure; nothing was broadcast.
    SimulationFailed(SimulationFailure),
}

/// Orchestrates sends for on-chain interactions.
pub struct TransactionSender {
    rpc: Arc<dyn RpcClient>,
}

impl TransactionSender {
    pub fn new(rpc: Arc<dyn RpcClient>) -> Self {
        Self { rpc }
    }

    /// Send (or resend) the transaction for `interaction`.
    ///
    /// Re-enter for the same interaction only to resend a dropped
    /// transaction at the same nonce or to bump fees on a stuck one. A
    /// drop that calls for a fresh nonce needs a fresh interaction.
    pub async fn send_for(
        &self,
        interaction: &mut OnchainInteraction,
        sender: Address,
        nonces: &NonceAllocator,
        decoder: &dyn SimulationDecoder,
        journal: &dyn ExecutionJournal,
        future_id: &str,
    ) -> Result<SendOutcome, ExecutionError> {
        let nonce = match interaction.nonce {
            Some(nonce) => nonce,
            None => {
                let nonce = nonces.get_next_nonce(sender).await?;
                // Writing the nonce completes the reservation; it survives
                // even if this attempt fails before broadcasting.
                interaction.nonce = Some(nonce);
                nonce
            }
        };

        let recommended = self.rpc.get_network_fees().await?;
        let fees = next_fees(recommended, interaction.last_fees())?;
        debug!(
            future = future_id,
            sender = %sender,
            nonce,
            attempt = interaction.transactions.len() + 1,
            fees = %fees,
            "prepared fees for send"
        );

        let request = build_request(interaction, sender, nonce, Some(fees));

        let gas_limit = match self.rpc.estimate_gas(&request).await {
            Ok(gas) => gas,
            Err(err) => {
                // Re-simulate without fee fields. With fees attached the
                // node assumes the block gas limit and can misreport an
                // insufficient balance instead of the underlying revert.
                let feeless = build_request(interaction, sender, nonce, None);
                let raw = self.rpc.call(&feeless, BlockTag::Pending).await?;
                if let Some(failure) = decoder.decode(&raw) {
                    return Ok(self.simulation_failed(future_id, sender, nonce, failure));
                }
                return Err(classify_estimation_error(err, sender, interaction));
            }
        };

        let request = request.with_gas_limit(gas_limit);
        let raw = self.rpc.call(&request, BlockTag::Pending).await?;
        if let Some(failure) = decoder.decode(&raw) {
            return Ok(self.simulation_failed(future_id, sender, nonce, failure));
        }

        // The intent record must be durable before the broadcast so a
        // post-crash replay observes the nonce reservation.
        journal
            .record(JournalEntry::TransactionPrepareSend {
                future_id: future_id.to_string(),
                network_interaction_id: interaction.id,
                nonce,
            })
            .await?;

        let hash = self.rpc.send_transaction(&request).await?;
        interaction.transactions.push(TransactionRecord { hash, fees });
        info!(
            future = future_id,
            sender = %sender,
            nonce,
            hash = %hash,
            fees = %fees,
            "transaction broadcast"
        );
        Ok(SendOutcome::Sent(SentTransaction { hash, nonce, fees }))
    }

    fn simulation_failed(
        &self,
        future_id: &str,
        sender: Address,
        nonce: u64,
        failure: SimulationFailure,
    ) -> SendOutcome {
        warn!(
            future = future_id,
            sender = %sender,
            nonce,
            reason = %failure.reason,
            "simulation decoded a failure; not broadcasting"
        );
        SendOutcome::SimulationFailed(failure)
    }
}

fn build_request(
    interaction: &OnchainInteraction,
    sender: Address,
    nonce: u64,
    fees: Option<NetworkFees>,
) -> TransactionRequest {
    let request = TransactionRequest::default()
        .with_from(sender)
        .with_input(interaction.data.clone())
        .with_value(interaction.value)
        .with_nonce(nonce);
    let request = match interaction.to {
        Some(to) => request.with_to(to),
        None => request.with_kind(TxKind::Create),
    };
    match fees {
        Some(NetworkFees::Legacy { gas_price }) => request.with_gas_price(gas_price),
        Some(NetworkFees::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }) => request
            .with_max_fee_per_gas(max_fee_per_gas)
            .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
        None => request,
    }
}

fn classify_estimation_error(
    err: anyhow::Error,
    sender: Address,
    interaction: &OnchainInteraction,
) -> ExecutionError {
    let message = format!("{err:#}");
    match classify_estimation_failure(&message) {
        EstimationFailureKind::InsufficientFundsForTransfer => {
            ExecutionError::InsufficientFundsForTransfer {
                sender,
                amount: interaction.value,
            }
        }
        EstimationFailureKind::InsufficientFundsForDeploy => {
            ExecutionError::InsufficientFundsForDeploy { sender }
        }
        EstimationFailureKind::Other => ExecutionError::GasEstimationFailed { sender, message },
    }
}
