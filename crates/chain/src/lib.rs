//! Chain interaction layer for the deployment engine.
//!
//! This crate provides:
//! - A typed JSON-RPC client abstraction over an Ethereum node
//! - Network fee models (Legacy and EIP-1559) and the replacement fee policy

mod fees;
mod rpc;

pub use fees::{next_fees, FeeError, NetworkFees};
pub use rpc::{
    BlockHeader, BlockTag, HttpRpcClient, RawCallResult, RpcClient, TransactionStatus,
};
