//! Deployment execution engine for EVM networks.
//!
//! `deploykit` drives declarative deployment plans to completion against a
//! remote JSON-RPC node. It owns the hard parts of getting transactions
//! onto the chain: nonce allocation and reconciliation, fee computation
//! with replacement bumps, pre-send simulation, confirmation-depth
//! accounting, and the intent journal used for crash recovery.
//!
//! The planner and the execution strategy live above this crate; they
//! interact with the engine through [`DeploymentExecutor`], the
//! [`SimulationDecoder`] seam, and the event stream returned by nonce
//! syncing.

pub use deploykit_chain::{
    next_fees, BlockHeader, BlockTag, FeeError, HttpRpcClient, NetworkFees, RawCallResult,
    RpcClient, TransactionStatus,
};
pub use deploykit_core::{
    classify_estimation_failure, DeploymentState, DeploymentExecutor, EstimationFailureKind,
    ExecutionConfig, ExecutionError, ExecutionJournal, ExecutionState, ExecutionStatus,
    FutureKind, JournalEntry, MemoryJournal, NonceAllocator, NonceSyncEngine, NonceSyncEvent,
    OnchainInteraction, PlannedFuture, SendOutcome, SenderSpec, SentTransaction,
    SimulationDecoder, SimulationFailure, StandardRevertDecoder, TransactionRecord,
    TransactionSender,
};
