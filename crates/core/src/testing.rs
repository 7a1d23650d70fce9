//! Test doubles shared across the crate's unit tests.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use deploykit_chain::{
    BlockHeader, BlockTag, NetworkFees, RawCallResult, RpcClient, TransactionStatus,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::journal::{ExecutionJournal, JournalEntry};
use crate::simulation::{SimulationDecoder, SimulationFailure};

#[derive(Debug, Default)]
struct MockState {
    block_number: u64,
    base_fee_per_gas: Option<u64>,
    latest_counts: HashMap<Address, u64>,
    pending_counts: HashMap<Address, u64>,
    numbered_counts: HashMap<(Address, u64), u64>,
    known_transactions: HashSet<B256>,
    fees: Option<NetworkFees>,
    gas_estimate: Option<u64>,
    estimate_error: Option<String>,
    call_reverted: bool,
    send_hash: B256,
}

/// Programmable node double. Every call is appended to `log` so tests can
/// assert on ordering and on which endpoints were touched.
#[derive(Debug, Default)]
pub struct MockRpc {
    inner: Mutex<MockState>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MockRpc {
    pub fn set_block_number(&self, number: u64) {
        self.inner.lock().block_number = number;
    }

    pub fn set_latest_count(&self, sender: Address, count: u64) {
        self.inner.lock().latest_counts.insert(sender, count);
    }

    pub fn set_pending_count(&self, sender: Address, count: u64) {
        self.inner.lock().pending_counts.insert(sender, count);
    }

    pub fn set_count_at(&self, sender: Address, block: u64, count: u64) {
        self.inner
            .lock()
            .numbered_counts
            .insert((sender, block), count);
    }

    pub fn add_known_transaction(&self, hash: B256) {
        self.inner.lock().known_transactions.insert(hash);
    }

    pub fn set_fees(&self, fees: NetworkFees) {
        self.inner.lock().fees = Some(fees);
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.inner.lock().gas_estimate = Some(gas);
    }

    pub fn set_estimate_error(&self, message: impl Into<String>) {
        self.inner.lock().estimate_error = Some(message.into());
    }

    pub fn set_call_reverted(&self, reverted: bool) {
        self.inner.lock().call_reverted = reverted;
    }

    pub fn set_send_hash(&self, hash: B256) {
        self.inner.lock().send_hash = hash;
    }

    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn record(&self, line: impl Into<String>) {
        self.log.lock().push(line.into());
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn get_latest_block(&self) -> Result<BlockHeader> {
        self.record("get_latest_block");
        let state = self.inner.lock();
        Ok(BlockHeader {
            number: state.block_number,
            base_fee_per_gas: state.base_fee_per_gas,
        })
    }

    async fn get_transaction_count(&self, sender: Address, tag: BlockTag) -> Result<u64> {
        self.record(format!("get_transaction_count:{tag:?}"));
        let state = self.inner.lock();
        let count = match tag {
            BlockTag::Latest => state.latest_counts.get(&sender).copied(),
            BlockTag::Pending => state.pending_counts.get(&sender).copied(),
            BlockTag::Number(number) => state.numbered_counts.get(&(sender, number)).copied(),
        };
        count.ok_or_else(|| anyhow!("no {tag:?} transaction count configured for {sender}"))
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<TransactionStatus>> {
        self.record("get_transaction");
        let state = self.inner.lock();
        Ok(state.known_transactions.contains(&hash).then_some(
            TransactionStatus {
                hash,
                block_number: None,
            },
        ))
    }

    async fn call(&self, _tx: &TransactionRequest, _tag: BlockTag) -> Result<RawCallResult> {
        self.record("call");
        let state = self.inner.lock();
        Ok(RawCallResult {
            return_data: Default::default(),
            reverted: state.call_reverted,
        })
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64> {
        self.record("estimate_gas");
        let state = self.inner.lock();
        if let Some(message) = &state.estimate_error {
            bail!("{message}");
        }
        state
            .gas_estimate
            .ok_or_else(|| anyhow!("no gas estimate configured"))
    }

    async fn get_network_fees(&self) -> Result<NetworkFees> {
        self.record("get_network_fees");
        let state = self.inner.lock();
        state.fees.ok_or_else(|| anyhow!("no fees configured"))
    }

    async fn send_transaction(&self, _tx: &TransactionRequest) -> Result<B256> {
        self.record("send_transaction");
        let state = self.inner.lock();
        Ok(state.send_hash)
    }
}

/// Decoder returning a fixed answer regardless of the result.
pub struct StaticDecoder(pub Option<SimulationFailure>);

impl SimulationDecoder for StaticDecoder {
    fn decode(&self, _result: &RawCallResult) -> Option<SimulationFailure> {
        self.0.clone()
    }
}

/// Journal that also writes into a `MockRpc` call log, so tests can check
/// the ordering of journal writes against RPC calls.
pub struct SharedLogJournal {
    log: Arc<Mutex<Vec<String>>>,
    entries: Mutex<Vec<JournalEntry>>,
}

impl SharedLogJournal {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl ExecutionJournal for SharedLogJournal {
    async fn record(&self, entry: JournalEntry) -> Result<()> {
        self.log.lock().push("journal:record".to_string());
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// Install a compact subscriber for tests run with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
