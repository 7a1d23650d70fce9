//! Core execution logic of the deployment engine.
//!
//! This crate drives declarative deployment steps to completion against a
//! remote node:
//! - Deployment execution state and on-chain interaction records
//! - Per-sender nonce allocation seeded from the node's mempool view
//! - The send pipeline: fees, gas estimation, simulation, journal, broadcast
//! - The nonce sync engine reconciling local state with the chain
//! - The append-only intent journal interface used for crash recovery

pub mod config;
mod error;
mod executor;
mod journal;
mod module;
mod nonce;
mod nonce_sync;
mod quirks;
mod sender;
mod simulation;
mod state;

#[cfg(test)]
mod testing;

pub use config::ExecutionConfig;
pub use error::ExecutionError;
pub use executor::DeploymentExecutor;
pub use journal::{ExecutionJournal, JournalEntry, MemoryJournal};
pub use module::{FutureKind, PlannedFuture, SenderSpec};
pub use nonce::NonceAllocator;
pub use nonce_sync::{NonceSyncEngine, NonceSyncEvent};
pub use quirks::{classify_estimation_failure, EstimationFailureKind};
pub use sender::{SendOutcome, SentTransaction, TransactionSender};
pub use simulation::{SimulationDecoder, SimulationFailure, StandardRevertDecoder};
pub use state::{
    DeploymentState, ExecutionState, ExecutionStatus, OnchainInteraction, TransactionRecord,
};
