//! Append-only intent journal consumed by crash recovery.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Typed journal entries originating in the execution core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JournalEntry {
    /// Written immediately before a broadcast, so a post-crash replay
    /// observes the nonce reservation even if the broadcast never
    /// happened.
    TransactionPrepareSend {
        future_id: String,
        network_interaction_id: u64,
        nonce: u64,
    },
}

/// Append-only sink for journal entries.
///
/// `record` returns only once the entry is persisted well enough that a
/// post-crash replay will see it. Persistence format and storage belong to
/// the embedding engine.
#[async_trait]
pub trait ExecutionJournal: Send + Sync {
    async fn record(&self, entry: JournalEntry) -> anyhow::Result<()>;
}

/// In-process journal backed by a mutex-guarded buffer.
///
/// Suitable for tests and for embedders that replicate entries into their
/// own durable store.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries, oldest first.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl ExecutionJournal for MemoryJournal {
    async fn record(&self, entry: JournalEntry) -> anyhow::Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}
