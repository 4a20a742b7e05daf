//! World state backends.
//!
//! The world state is a key-value store scannable by key prefix. Writes are
//! only ever applied as a whole [`WriteSet`] at transaction commit.

use crate::error::LedgerResult;
use std::collections::BTreeMap;

/// Buffered writes of one transaction, applied atomically.
pub type WriteSet = BTreeMap<String, Vec<u8>>;

/// Key-value store backing the ledger.
pub trait WorldState: Send + Sync {
    /// Read a single key.
    fn get(&self, key: &str) -> LedgerResult<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> LedgerResult<Vec<(String, Vec<u8>)>>;

    /// Apply a write set. Either every write lands or none does.
    fn apply(&mut self, writes: WriteSet) -> LedgerResult<()>;
}

/// In-memory ordered world state.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorldState {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryWorldState {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl WorldState for MemoryWorldState {
    fn get(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> LedgerResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn apply(&mut self, writes: WriteSet) -> LedgerResult<()> {
        self.entries.extend(writes);
        Ok(())
    }
}

/// Result of a get-or-create operation.
///
/// Lets callers tell whether the read had the side effect of creating the
/// record.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<T> {
    /// Record did not exist and was created.
    Created(T),
    /// Record already existed.
    Existing(T),
}

impl<T> Upsert<T> {
    /// Whether the record was created by this call.
    pub fn was_created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }

    /// Borrow the record.
    pub fn get(&self) -> &T {
        match self {
            Upsert::Created(value) | Upsert::Existing(value) => value,
        }
    }

    /// Take the record.
    pub fn into_inner(self) -> T {
        match self {
            Upsert::Created(value) | Upsert::Existing(value) => value,
        }
    }
}
