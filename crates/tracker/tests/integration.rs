//! Ledger and tracker wired together in-process.

use fedchain_ledger::{Ledger, LedgerConfig};
use fedchain_tracker::{
    BroadcastPublisher, LedgerGateway, ListenerError, RoundTrackerService, TrackerConfig,
    TrackerHandle, TrackerMetrics,
};
use fedchain_types::AggregationRequest;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct Harness {
    ledger: Arc<Ledger>,
    handle: TrackerHandle,
    aggregations: broadcast::Receiver<String>,
    metrics: Arc<TrackerMetrics>,
    _listener_task: JoinHandle<Result<(), ListenerError>>,
    _service_task: JoinHandle<()>,
}

fn start() -> Harness {
    let ledger = Arc::new(Ledger::in_memory(LedgerConfig::default()));
    let publisher = Arc::new(BroadcastPublisher::new(16));
    let aggregations = publisher.subscribe();
    let metrics = Arc::new(TrackerMetrics::new(&Registry::new()).unwrap());

    let (mut service, mut listener) = RoundTrackerService::new(
        TrackerConfig::default(),
        ledger.subscribe(),
        Arc::new(LedgerGateway::new(ledger.clone())),
        publisher,
        metrics.clone(),
    )
    .unwrap();
    let handle = service.handle();

    let listener_task = tokio::spawn(async move { listener.run().await });
    let service_task = tokio::spawn(async move {
        service.run().await.unwrap();
    });

    Harness {
        ledger,
        handle,
        aggregations,
        metrics,
        _listener_task: listener_task,
        _service_task: service_task,
    }
}

fn contribute(ledger: &Ledger, id: &str, round_id: &str, participant: &str) {
    let uri = format!("{round_id}/{participant}.weights");
    ledger
        .submit(
            "RecordModelContribution",
            &[id, round_id, participant, "sha256:00", &uri, "{}", "{}"],
        )
        .unwrap();
}

/// Wait until the tracker has consumed everything committed so far.
async fn settle(harness: &Harness, expected_events: u64) {
    for _ in 0..200 {
        let processed: u64 = ["ROUND_STARTED", "MODEL_UPLOADED", "AGGREGATED_MODEL_SUBMITTED"]
            .iter()
            .map(|name| {
                harness
                    .metrics
                    .events_processed_total
                    .with_label_values(&[*name])
                    .get()
            })
            .sum();
        if processed >= expected_events {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("tracker did not process {expected_events} events in time");
}

#[tokio::test]
async fn test_round1_triggers_single_aggregation() {
    let mut harness = start();
    let ledger = harness.ledger.clone();

    ledger
        .submit("CreateTrainingRound", &["round1", "dbs", "fraud model"])
        .unwrap();
    ledger
        .submit("UpdateRoundParticipants", &["round1", r#"["dbs","ing","ocbc"]"#])
        .unwrap();
    settle(&harness, 1).await;

    contribute(&ledger, "c1", "round1", "dbs");
    contribute(&ledger, "c2", "round1", "ing");
    settle(&harness, 3).await;
    assert!(harness.aggregations.try_recv().is_err());

    contribute(&ledger, "c3", "round1", "ocbc");
    // Late duplicate after quorum.
    contribute(&ledger, "c4", "round1", "dbs");
    settle(&harness, 5).await;

    let message = tokio::time::timeout(Duration::from_secs(1), harness.aggregations.recv())
        .await
        .unwrap()
        .unwrap();
    let request: AggregationRequest = serde_json::from_str(&message).unwrap();
    assert_eq!(request.event, "START_AGGREGATION");
    assert_eq!(request.round_id, "round1");
    assert_eq!(request.submissions.len(), 3);
    assert_eq!(request.submissions["ocbc"], "round1/ocbc.weights");
    assert_eq!(request.submissions["dbs"], "round1/dbs.weights");

    assert!(harness.aggregations.try_recv().is_err());
    assert_eq!(harness.metrics.aggregations_triggered_total.get(), 1);
    assert!(harness.handle.active_rounds().await.is_empty());
}

#[tokio::test]
async fn test_round_without_participants_uses_defaults() {
    let mut harness = start();
    let ledger = harness.ledger.clone();

    ledger.submit("CreateTrainingRound", &["r2", "ing", ""]).unwrap();
    settle(&harness, 1).await;
    let info = harness.handle.round("r2").await.unwrap();
    assert_eq!(info.expected_participants, vec!["dbs", "ing", "ocbc"]);

    for (i, bank) in ["ocbc", "ing", "dbs"].iter().enumerate() {
        contribute(&ledger, &format!("c{i}"), "r2", bank);
    }
    settle(&harness, 4).await;

    let message = tokio::time::timeout(Duration::from_secs(1), harness.aggregations.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(message.contains("\"round_id\":\"r2\""));
}

#[tokio::test]
async fn test_stream_end_is_upstream_failure() {
    let ledger = Arc::new(Ledger::in_memory(LedgerConfig::default()));
    let (upstream_tx, upstream_rx) = tokio::sync::mpsc::unbounded_channel();
    let (mut service, mut listener) = RoundTrackerService::new(
        TrackerConfig::default(),
        upstream_rx,
        Arc::new(LedgerGateway::new(ledger)),
        Arc::new(BroadcastPublisher::new(4)),
        Arc::new(TrackerMetrics::new(&Registry::new()).unwrap()),
    )
    .unwrap();

    let service_task = tokio::spawn(async move { service.run().await });
    drop(upstream_tx);

    let result = listener.run().await;
    assert!(matches!(result, Err(ListenerError::Subscription(_))));
    // The service drains and stops once the listener is gone.
    drop(listener);
    assert!(service_task.await.unwrap().is_ok());
}
