//! Prometheus metrics for the round tracker

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct TrackerMetrics {
    /// Ledger events handled, by event name
    pub events_processed_total: IntCounterVec,
    pub submissions_recorded_total: IntCounter,
    /// Submissions whose round could not be resolved
    pub submissions_dropped_total: IntCounter,
    pub aggregations_triggered_total: IntCounter,
    pub publish_failures_total: IntCounter,
    pub tracked_rounds: IntGauge,
    registry: Registry,
}

impl TrackerMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let events_processed_total = IntCounterVec::new(
            Opts::new(
                "fedchain_tracker_events_processed_total",
                "Total number of ledger events handled by the tracker",
            ),
            &["event"],
        )?;
        let submissions_recorded_total = IntCounter::new(
            "fedchain_tracker_submissions_recorded_total",
            "Total number of model submissions recorded",
        )?;
        let submissions_dropped_total = IntCounter::new(
            "fedchain_tracker_submissions_dropped_total",
            "Total number of model submissions dropped for unresolvable rounds",
        )?;
        let aggregations_triggered_total = IntCounter::new(
            "fedchain_tracker_aggregations_triggered_total",
            "Total number of rounds that triggered aggregation",
        )?;
        let publish_failures_total = IntCounter::new(
            "fedchain_tracker_publish_failures_total",
            "Total number of aggregation requests that failed to publish",
        )?;
        let tracked_rounds = IntGauge::new(
            "fedchain_tracker_tracked_rounds",
            "Number of rounds held in the tracker",
        )?;

        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(submissions_recorded_total.clone()))?;
        registry.register(Box::new(submissions_dropped_total.clone()))?;
        registry.register(Box::new(aggregations_triggered_total.clone()))?;
        registry.register(Box::new(publish_failures_total.clone()))?;
        registry.register(Box::new(tracked_rounds.clone()))?;

        Ok(Self {
            events_processed_total,
            submissions_recorded_total,
            submissions_dropped_total,
            aggregations_triggered_total,
            publish_failures_total,
            tracked_rounds,
            registry: registry.clone(),
        })
    }

    /// Render every metric in the registry in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let registry = Registry::new();
        let metrics = TrackerMetrics::new(&registry).expect("metrics");

        let initial = metrics
            .events_processed_total
            .with_label_values(&["ROUND_STARTED"])
            .get();
        assert_eq!(initial, 0);
        assert_eq!(metrics.tracked_rounds.get(), 0);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        TrackerMetrics::new(&registry).expect("first registration");
        assert!(TrackerMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_metrics_encoding() {
        let registry = Registry::new();
        let metrics = TrackerMetrics::new(&registry).expect("metrics");
        metrics.aggregations_triggered_total.inc();
        metrics.tracked_rounds.set(4);

        let encoded = metrics.encode().expect("encode");
        assert!(encoded.contains("fedchain_tracker_aggregations_triggered_total 1"));
        assert!(encoded.contains("fedchain_tracker_tracked_rounds 4"));
    }
}
