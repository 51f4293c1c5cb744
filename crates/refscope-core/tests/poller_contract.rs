//! Contract Test: Poller
//!
//! This test verifies the async driver around the catalog.
//!
//! Constraints verified:
//! - Requests from handles are served on the poller task
//! - Ticks run on their own and report changes as events
//! - Shutdown is deterministic and reported exactly once
//! - Dropping every handle does not stop ticking
//!
//! If this test fails, the poller can hang or lose requests.

mod common;

use common::*;
use refscope_core::{
    Catalog, CatalogEvent, Error, Poller, Record, RecordKind, RefSource, SampleValue, SearchQuery,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

fn poller_for(host: &ScriptedHost) -> (Poller, refscope_core::PollerHandle, mpsc::Receiver<CatalogEvent>) {
    let config = minimal_config();
    let catalog = Catalog::new(
        Box::new(ScriptedHost::sharing_counters_with(host)),
        config.clone(),
    )
    .expect("catalog construction succeeds");

    Poller::new(catalog, config.poller).expect("poller construction succeeds")
}

/// Wait for the first event matching `pred`, failing after one second
async fn wait_for(
    events: &mut mpsc::Receiver<CatalogEvent>,
    pred: impl Fn(&CatalogEvent) -> bool,
) -> CatalogEvent {
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within 1s")
}

#[tokio::test]
async fn requests_are_served_while_running() {
    let host = ScriptedHost::new()
        .with_value("sim/a", SampleValue::Int(0))
        .with_command("sim/go");
    let (mut poller, handle, mut events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    assert!(matches!(
        wait_for(&mut events, |e| matches!(e, CatalogEvent::Started { .. })).await,
        CatalogEvent::Started { values: 0, commands: 0 }
    ));

    let registered = handle
        .ingest(["sim/a", "sim/go", "sim/missing"], RefSource::UserEntered)
        .await
        .unwrap();
    assert_eq!(registered, 2);
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, CatalogEvent::Ingested { .. })).await,
        CatalogEvent::Ingested { registered: 2 }
    );

    let hits = handle.search(SearchQuery::new("sim")).await.unwrap();
    let names: Vec<(&str, RecordKind)> = hits.iter().map(|h| (h.name.as_str(), h.kind)).collect();
    assert_eq!(names, vec![("sim/a", RecordKind::Value), ("sim/go", RecordKind::Command)]);

    handle.invoke("sim/go").await.unwrap();
    assert_eq!(host.invoked(), vec!["sim/go".to_string()]);

    assert!(matches!(
        handle.invoke("sim/a").await,
        Err(Error::NotFound(_))
    ));

    shutdown_tx.send(()).unwrap();
    poller_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_search_expression_is_returned_to_the_caller() {
    let host = ScriptedHost::new().with_value("sim/a", SampleValue::Int(0));
    let (mut poller, handle, _events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    let result = handle.search(SearchQuery::new("(").regex(true)).await;
    assert!(matches!(result, Err(Error::InvalidPattern { .. })));

    shutdown_tx.send(()).unwrap();
    poller_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn ticks_detect_changes_without_requests() {
    let host = ScriptedHost::new().with_value("sim/alt", SampleValue::Float(1000.0));
    let (mut poller, handle, mut events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    handle.ingest(["sim/alt"], RefSource::Enumerated).await.unwrap();
    host.set("sim/alt", SampleValue::Float(2000.0));

    let event = wait_for(&mut events, |e| matches!(e, CatalogEvent::Ticked { .. })).await;
    assert_eq!(event, CatalogEvent::Ticked { changed: 1, big_changes: 1 });

    let recent = handle
        .search(SearchQuery::all().recent_only(true).big_changes_only(true))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].name, "sim/alt");
    assert!(recent[0].last_big_update_time > refscope_core::NEVER);

    shutdown_tx.send(()).unwrap();
    poller_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn blacklist_requests_stop_sampling() {
    let host = ScriptedHost::new().with_value("sim/heavy", SampleValue::Int(0));
    let (mut poller, handle, _events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    handle.ingest(["sim/heavy"], RefSource::Enumerated).await.unwrap();
    handle.set_blacklisted("sim/heavy", true).await.unwrap();
    let reads = host.reads_of("sim/heavy");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(host.reads_of("sim/heavy"), reads);

    assert!(matches!(
        handle.set_blacklisted("sim/unknown", true).await,
        Err(Error::NotFound(_))
    ));

    shutdown_tx.send(()).unwrap();
    poller_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_is_reported_once_and_stops_the_loop() {
    let host = ScriptedHost::new().with_value("sim/a", SampleValue::Int(0));
    let (mut poller, handle, mut events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    handle.ingest(["sim/a"], RefSource::Enumerated).await.unwrap();
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(1), poller_task)
        .await
        .expect("poller stops within 1s")
        .unwrap()
        .unwrap();

    let mut stopped = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CatalogEvent::Stopped { .. }) {
            stopped += 1;
        }
    }
    assert_eq!(stopped, 1);

    // The poller is gone: requests fail instead of hanging.
    assert!(handle.search(SearchQuery::all()).await.is_err());
}

#[tokio::test]
async fn dropping_handles_does_not_stop_ticking() {
    let host = ScriptedHost::new().with_value("sim/a", SampleValue::Int(0));
    let (mut poller, handle, mut events) = poller_for(&host);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task =
        tokio::spawn(async move { poller.run_with_shutdown(Some(shutdown_rx)).await });

    handle.ingest(["sim/a"], RefSource::Enumerated).await.unwrap();
    drop(handle);

    host.set("sim/a", SampleValue::Int(1));
    wait_for(&mut events, |e| matches!(e, CatalogEvent::Ticked { .. })).await;
    assert!(!poller_task.is_finished());

    shutdown_tx.send(()).unwrap();
    poller_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn dropped_event_receiver_does_not_stop_tracking() {
    let host = ScriptedHost::new().with_value("sim/alt", SampleValue::Float(1000.0));
    let (mut poller, handle, events) = poller_for(&host);
    drop(events);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller_task = tokio::spawn(async move {
        let result = poller.run_with_shutdown(Some(shutdown_rx)).await;
        (poller, result)
    });

    handle.ingest(["sim/alt"], RefSource::Enumerated).await.unwrap();
    host.set("sim/alt", SampleValue::Float(2000.0));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let recent = handle
        .search(SearchQuery::all().recent_only(true).big_changes_only(true))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);

    shutdown_tx.send(()).unwrap();
    let (poller, result) = poller_task.await.unwrap();
    result.unwrap();

    // The catalog comes back with everything the poller tracked.
    let catalog = poller.into_catalog();
    let record = catalog.store().value_by_name("sim/alt").unwrap();
    assert_eq!(record.last_value(), &SampleValue::Float(2000.0));
    assert!(record.last_big_update_time() > refscope_core::NEVER);
}
