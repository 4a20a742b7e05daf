//! # Federated Round Ledger
//!
//! Ledger-resident state machine for federated-learning rounds. It records
//! rounds, model contributions, participation responses, reputation and
//! quality metrics, and answers whether a round has reached quorum.
//!
//! ## Architecture
//!
//! ```text
//! submit(name, args) → Contract → TxContext (buffered writes + events)
//!                                      │ commit
//!                                      ▼
//!                                 WorldState → subscribers (ChaincodeEvent)
//! ```
//!
//! ## Components
//!
//! - [`Ledger`]: transaction host; serializes transactions and commits them atomically
//! - [`Contract`]: dispatches transactions by name
//! - [`rounds`], [`contributions`], [`participation`], [`reputation`],
//!   [`quality`], [`audit`]: per-record-kind operations
//! - [`quorum`]: explicit-list and legacy-count readiness policies
//!
//! ## Example
//!
//! ```rust,ignore
//! use fedchain_ledger::{Ledger, LedgerConfig};
//!
//! let ledger = Ledger::in_memory(LedgerConfig::default());
//! let mut events = ledger.subscribe();
//!
//! ledger.submit("CreateTrainingRound", &["round1", "dbs", "fraud model"])?;
//! ledger.submit("UpdateRoundParticipants", &["round1", r#"["dbs","ing","ocbc"]"#])?;
//! let status = ledger.evaluate("GetRoundParticipationStatus", &["round1"])?;
//! ```

#![warn(clippy::all)]

pub mod audit;
pub mod context;
pub mod contract;
pub mod contributions;
pub mod error;
pub mod host;
pub mod keys;
pub mod participation;
pub mod quality;
pub mod quorum;
pub mod reputation;
pub mod rounds;
pub mod state;

pub use context::{Clock, SystemClock, TxContext};
pub use contract::{Contract, TRANSACTIONS};
pub use contributions::ContributionSubmission;
pub use error::{LedgerError, LedgerResult};
pub use host::{Ledger, LedgerConfig, DEFAULT_LEGACY_QUORUM_THRESHOLD};
pub use participation::ParticipationResponse;
pub use quality::QualityReport;
pub use quorum::{QuorumOutcome, QuorumPolicy};
pub use state::{MemoryWorldState, Upsert, WorldState, WriteSet};
