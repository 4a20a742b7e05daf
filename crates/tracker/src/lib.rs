//! # Off-chain Round Tracker
//!
//! Watches the ledger's event stream, keeps an in-memory view of which
//! participants have submitted models for each round, and tells downstream
//! aggregation when a round has everything it needs.
//!
//! ## Architecture
//!
//! ```text
//! Ledger events → EventListener → RoundTrackerService → AggregationSink
//!                                        │
//!                                        └─ RoundDirectory (participant lookups)
//! ```
//!
//! ## Components
//!
//! - [`EventListener`]: decodes the ledger subscription and forwards events
//! - [`RoundTrackerService`]: owns the tracker state and reacts to events
//! - [`TrackerHandle`]: cloneable read access to the tracker state
//! - [`RoundDirectory`] / [`LedgerGateway`]: resolve a round's participants
//! - [`AggregationSink`] / [`BroadcastPublisher`]: deliver `START_AGGREGATION`
//!
//! ## Example
//!
//! ```rust,ignore
//! let ledger = Arc::new(Ledger::in_memory(LedgerConfig::default()));
//! let publisher = Arc::new(BroadcastPublisher::new(64));
//! let metrics = Arc::new(TrackerMetrics::new(&Registry::new())?);
//!
//! let (mut service, mut listener) = RoundTrackerService::new(
//!     TrackerConfig::default(),
//!     ledger.subscribe(),
//!     Arc::new(LedgerGateway::new(ledger.clone())),
//!     publisher.clone(),
//!     metrics,
//! )?;
//!
//! tokio::spawn(async move { listener.run().await });
//! service.run().await?;
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod listener;
pub mod metrics;
pub mod publisher;
pub mod service;
pub mod state;

pub use config::TrackerConfig;
pub use error::{
    ListenerError, ListenerResult, PublishError, PublishResult, TrackerError, TrackerResult,
};
pub use gateway::{LedgerGateway, RoundDirectory};
pub use listener::EventListener;
pub use metrics::TrackerMetrics;
pub use publisher::{AggregationSink, BroadcastPublisher};
pub use service::{RoundTrackerService, TrackerHandle};
pub use state::{RoundInfo, RoundTracker, SubmissionOutcome};
