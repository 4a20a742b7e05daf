//! Transaction host.
//!
//! [`Ledger`] owns the world state and executes contract transactions one
//! at a time. `submit` commits the transaction's write set atomically and
//! then delivers its events to every subscriber in commit order; `evaluate`
//! runs the same code and throws the effects away.

use crate::context::{Clock, SystemClock, TxContext};
use crate::contract::Contract;
use crate::error::{LedgerError, LedgerResult};
use crate::state::{MemoryWorldState, WorldState};
use fedchain_types::ChaincodeEvent;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default distinct-contributor count for rounds without a participant list.
pub const DEFAULT_LEGACY_QUORUM_THRESHOLD: usize = 3;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Distinct contributors required when a round has no explicit participants.
    pub legacy_quorum_threshold: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            legacy_quorum_threshold: DEFAULT_LEGACY_QUORUM_THRESHOLD,
        }
    }
}

struct Committed<S> {
    state: S,
    tx_seq: u64,
}

/// Serializing transaction host over a world state backend.
///
/// Transactions run under a single lock, so two concurrent
/// `UpdateRoundParticipants` calls on the same round resolve as
/// last-writer-wins; use `OptInParticipant` / `OptOutParticipant` for
/// keyed membership changes.
pub struct Ledger<S: WorldState = MemoryWorldState> {
    committed: Mutex<Committed<S>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChaincodeEvent>>>,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
}

impl Ledger<MemoryWorldState> {
    /// In-memory ledger with the given configuration.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(MemoryWorldState::new(), config)
    }
}

impl<S: WorldState> Ledger<S> {
    /// Create a ledger over an existing world state.
    pub fn new(state: S, config: LedgerConfig) -> Self {
        Self {
            committed: Mutex::new(Committed { state, tx_seq: 0 }),
            subscribers: Mutex::new(Vec::new()),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Sequence number of the last committed transaction.
    pub fn height(&self) -> LedgerResult<u64> {
        Ok(self.lock_committed()?.tx_seq)
    }

    /// Subscribe to events of transactions committed from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChaincodeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Invoke a named transaction and commit it. Returns the JSON response.
    pub fn submit(&self, name: &str, args: &[&str]) -> LedgerResult<Vec<u8>> {
        let result = self.transact(|ctx| Contract::invoke(ctx, name, args));
        if let Err(ref e) = result {
            debug!(transaction = name, error = %e, "Transaction rejected");
        }
        result
    }

    /// Invoke a named transaction without committing anything.
    pub fn evaluate(&self, name: &str, args: &[&str]) -> LedgerResult<Vec<u8>> {
        self.query(|ctx| Contract::invoke(ctx, name, args))
    }

    /// Run `f` as one transaction and commit its effects if it succeeds.
    pub fn transact<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut TxContext<'_>) -> LedgerResult<T>,
    {
        let mut committed = self.lock_committed()?;
        let timestamp = self.clock.now();

        let mut ctx = TxContext::new(&committed.state, &self.config, timestamp);
        let output = f(&mut ctx)?;
        let (writes, events) = ctx.into_parts();

        let tx_seq = committed.tx_seq + 1;
        let encoded = events
            .iter()
            .map(|event| {
                Ok(ChaincodeEvent {
                    tx_seq,
                    event_name: event.name().to_string(),
                    payload: event.encode_payload()?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let write_count = writes.len();
        committed.state.apply(writes)?;
        committed.tx_seq = tx_seq;

        debug!(
            tx_seq,
            writes = write_count,
            events = encoded.len(),
            "Transaction committed"
        );

        // Delivered while the commit lock is held so subscribers observe commit order.
        self.deliver(encoded);
        Ok(output)
    }

    /// Run `f` against committed state and discard its effects.
    pub fn query<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut TxContext<'_>) -> LedgerResult<T>,
    {
        let committed = self.lock_committed()?;
        let mut ctx = TxContext::new(&committed.state, &self.config, self.clock.now());
        f(&mut ctx)
    }

    fn deliver(&self, events: Vec<ChaincodeEvent>) {
        if events.is_empty() {
            return;
        }
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|subscriber| {
            events
                .iter()
                .all(|event| subscriber.send(event.clone()).is_ok())
        });
        if subscribers.is_empty() {
            warn!("No event subscribers; events dropped");
        }
    }

    fn lock_committed(&self) -> LedgerResult<MutexGuard<'_, Committed<S>>> {
        self.committed
            .lock()
            .map_err(|_| LedgerError::Storage("world state lock poisoned".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that only moves when told to.
    #[derive(Debug, Default)]
    pub struct ManualClock(AtomicI64);

    impl ManualClock {
        pub fn at(now: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(now)))
        }

        pub fn advance(&self, secs: i64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub fn ledger_at(now: i64) -> (Ledger, Arc<ManualClock>) {
        let clock = ManualClock::at(now);
        let ledger = Ledger::in_memory(LedgerConfig::default()).with_clock(clock.clone());
        (ledger, clock)
    }
}
