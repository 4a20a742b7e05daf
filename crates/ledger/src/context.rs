//! Transaction context.
//!
//! A [`TxContext`] is handed to every contract operation. Reads see the
//! committed world state overlaid with the transaction's own writes; writes
//! and events stay buffered until the host commits them.

use crate::error::LedgerResult;
use crate::host::LedgerConfig;
use crate::state::{WorldState, WriteSet};
use fedchain_types::{LedgerEvent, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of transaction timestamps.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as Timestamp)
            .unwrap_or_default()
    }
}

/// Execution context of a single ledger transaction.
pub struct TxContext<'a> {
    state: &'a dyn WorldState,
    config: &'a LedgerConfig,
    timestamp: Timestamp,
    writes: WriteSet,
    events: Vec<LedgerEvent>,
}

impl<'a> TxContext<'a> {
    /// Open a context over committed state.
    pub fn new(state: &'a dyn WorldState, config: &'a LedgerConfig, timestamp: Timestamp) -> Self {
        Self {
            state,
            config,
            timestamp,
            writes: WriteSet::new(),
            events: Vec::new(),
        }
    }

    /// Transaction timestamp; constant for the whole transaction.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        self.config
    }

    /// Read a key, seeing this transaction's own writes.
    pub fn get_state(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }
        self.state.get(key)
    }

    /// Buffer a write.
    pub fn put_state(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.writes.insert(key.into(), value);
    }

    /// Prefix scan over committed state merged with buffered writes, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> LedgerResult<Vec<(String, Vec<u8>)>> {
        let mut merged: BTreeMap<String, Vec<u8>> =
            self.state.scan_prefix(prefix)?.into_iter().collect();
        for (key, value) in self.writes.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged.into_iter().collect())
    }

    /// Whether a key holds a value.
    pub fn exists(&self, key: &str) -> LedgerResult<bool> {
        Ok(self.get_state(key)?.is_some())
    }

    /// Read and decode a JSON record.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> LedgerResult<Option<T>> {
        match self.get_state(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encode and buffer a JSON record.
    pub fn put_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> LedgerResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_state(key, bytes);
        Ok(())
    }

    /// Decode every record under a prefix. Fails on the first undecodable record.
    pub fn scan_json<T: DeserializeOwned>(&self, prefix: &str) -> LedgerResult<Vec<T>> {
        self.scan_prefix(prefix)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(Into::into))
            .collect()
    }

    /// Queue an event for delivery after commit.
    pub fn set_event(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Events queued so far.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Split into the write set and events for commit.
    pub fn into_parts(self) -> (WriteSet, Vec<LedgerEvent>) {
        (self.writes, self.events)
    }
}
