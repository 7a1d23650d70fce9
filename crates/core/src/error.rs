//! Typed failures raised by the execution core.
//!
//! Transport-level RPC failures are not part of this taxonomy; they pass
//! through the `Transport` variant unchanged so the caller can retry the
//! whole operation.

use alloy::primitives::{Address, U256};
use deploykit_chain::FeeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Another party's transactions must confirm before the engine can
    /// allocate nonces for this sender.
    #[error(
        "sender {sender} has unconfirmed transactions; wait for {required_confirmations} confirmations and run again"
    )]
    WaitingForConfirmations {
        sender: Address,
        required_confirmations: u64,
    },

    /// A nonce the engine owned was taken over by a transaction it did
    /// not send, and the takeover is not yet deep enough to act on.
    #[error(
        "nonce {nonce} of sender {sender} was taken by an external transaction; wait for {required_confirmations} confirmations and run again"
    )]
    WaitingForNonce {
        sender: Address,
        nonce: u64,
        required_confirmations: u64,
    },

    #[error("sender {sender} has insufficient funds to transfer {amount} wei")]
    InsufficientFundsForTransfer { sender: Address, amount: U256 },

    #[error("sender {sender} has insufficient funds to cover the deployment's code storage")]
    InsufficientFundsForDeploy { sender: Address },

    #[error("gas estimation failed for sender {sender}: {message}")]
    GasEstimationFailed { sender: Address, message: String },

    #[error(transparent)]
    Fee(#[from] FeeError),

    /// Transport-level failure, propagated unchanged for caller-side
    /// retry.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ExecutionError {
    /// Whether waiting for more confirmations and re-running can resolve
    /// this error without operator intervention.
    pub fn resolves_by_waiting(&self) -> bool {
        matches!(
            self,
            Self::WaitingForConfirmations { .. } | Self::WaitingForNonce { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_classification() {
        let wait = ExecutionError::WaitingForConfirmations {
            sender: Address::ZERO,
            required_confirmations: 5,
        };
        assert!(wait.resolves_by_waiting());

        let fatal = ExecutionError::InsufficientFundsForDeploy {
            sender: Address::ZERO,
        };
        assert!(!fatal.resolves_by_waiting());
    }
}
