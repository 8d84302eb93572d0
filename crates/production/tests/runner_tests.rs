//! End-to-end tests for the production runner.
//!
//! These run the detector on the tokio runtime with real timers and
//! in-process responders. Durations are short so each test finishes well
//! under a second; assertions only depend on ordering, never exact timing.

use chainwatch_detector::DetectorConfig;
use chainwatch_production::{DetectorRunner, FailureNotification, NodeResponder};
use chainwatch_types::test_utils::sent_log;
use chainwatch_types::{ClientId, NodeId, Violation};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const X: NodeId = NodeId(1);
const Y: NodeId = NodeId(2);
const Z: NodeId = NodeId(3);

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(2);

fn fast_config() -> DetectorConfig {
    DetectorConfig::default()
        .with_ping_timeout(Duration::from_millis(20))
        .with_round_interval(Duration::from_millis(40))
}

async fn next_failure(rx: &mut mpsc::UnboundedReceiver<FailureNotification>) -> NodeId {
    timeout(NOTIFICATION_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for failure notification")
        .expect("notification channel closed")
        .node
}

#[tokio::test]
async fn test_silent_node_reported_to_every_client() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (runner, handle) = DetectorRunner::new(fast_config());
    let x = NodeResponder::spawn(X, &handle).expect("attach x");
    let _y = NodeResponder::spawn(Y, &handle).expect("attach y");
    let _z = NodeResponder::spawn(Z, &handle).expect("attach z");
    x.pause();

    let mut first = handle.register_client(ClientId(1)).expect("register");
    let mut second = handle.register_client(ClientId(2)).expect("register");
    handle.configure([X, Y, Z]).expect("configure");
    let task = tokio::spawn(runner.run());

    assert_eq!(next_failure(&mut first).await, X);
    assert_eq!(next_failure(&mut second).await, X);

    // A few more rounds: X stays failed and is not pinged again.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let pings_at_failure = x.pings_received();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(x.pings_received(), pings_at_failure);
    assert_eq!(pings_at_failure, 2);
    assert!(first.try_recv().is_err(), "duplicate notification");

    drop(handle);
    let runner = task.await.expect("join").expect("run");
    let liveness = runner.detector().liveness();
    assert!(!liveness.is_alive(X));
    assert!(liveness.is_alive(Y));
    assert!(liveness.is_alive(Z));
}

#[tokio::test]
async fn test_responsive_nodes_never_fail() {
    let (runner, handle) = DetectorRunner::new(fast_config());
    let responders: Vec<_> = [X, Y, Z]
        .into_iter()
        .map(|node| NodeResponder::spawn(node, &handle).expect("attach"))
        .collect();
    let mut failures = handle.register_client(ClientId(1)).expect("register");
    handle.configure([X, Y, Z]).expect("configure");
    let task = tokio::spawn(runner.run());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(failures.try_recv().is_err());
    for responder in &responders {
        assert!(responder.pings_received() >= 2);
    }

    drop(handle);
    let runner = task.await.expect("join").expect("run");
    let stats = runner.detector().stats();
    assert_eq!(stats.nodes_failed, 0);
    assert!(stats.rounds_completed >= 2);
    // Every completed round ended through a cancel, won or lost.
    assert!(stats.fast_path_rounds + stats.cancel_races >= stats.rounds_completed);
}

#[tokio::test]
async fn test_node_failing_mid_run() {
    let (runner, handle) = DetectorRunner::new(fast_config());
    let x = NodeResponder::spawn(X, &handle).expect("attach x");
    let _y = NodeResponder::spawn(Y, &handle).expect("attach y");
    let mut failures = handle.register_client(ClientId(1)).expect("register");
    handle.configure([X, Y]).expect("configure");
    let task = tokio::spawn(runner.run());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(failures.try_recv().is_err());
    x.pause();

    assert_eq!(next_failure(&mut failures).await, X);

    drop(handle);
    task.await.expect("join").expect("run");
}

#[tokio::test]
async fn test_unregistered_client_hears_nothing() {
    let (runner, handle) = DetectorRunner::new(fast_config());
    let x = NodeResponder::spawn(X, &handle).expect("attach x");
    x.pause();

    let mut staying = handle.register_client(ClientId(1)).expect("register");
    let mut leaving = handle.register_client(ClientId(2)).expect("register");
    handle.unregister_client(ClientId(2)).expect("unregister");
    handle.configure([X]).expect("configure");
    let task = tokio::spawn(runner.run());

    assert_eq!(next_failure(&mut staying).await, X);
    // The runner drops the outlet of an unregistered client.
    assert!(timeout(Duration::from_millis(100), leaving.recv())
        .await
        .expect("channel should be closed")
        .is_none());

    drop(handle);
    task.await.expect("join").expect("run");
}

#[tokio::test]
async fn test_reconfigure_revives_recovered_node() {
    let (runner, handle) = DetectorRunner::new(fast_config());
    let x = NodeResponder::spawn(X, &handle).expect("attach x");
    x.pause();
    let mut failures = handle.register_client(ClientId(1)).expect("register");
    handle.configure([X]).expect("configure");
    let task = tokio::spawn(runner.run());

    assert_eq!(next_failure(&mut failures).await, X);
    let pings_at_failure = x.pings_received();

    x.resume();
    handle.configure([X]).expect("reconfigure");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(x.pings_received() > pings_at_failure);
    assert!(failures.try_recv().is_err());

    drop(handle);
    let runner = task.await.expect("join").expect("run");
    assert!(runner.detector().liveness().is_alive(X));
}

#[tokio::test]
async fn test_monitor_reports_violations() {
    let (runner, handle) = DetectorRunner::new(fast_config());
    let mut violations = handle.subscribe_violations().expect("subscribe");
    let (a, b, c) = (NodeId(10), NodeId(11), NodeId(12));

    handle.configure_monitor(vec![a, b, c]).expect("configure");
    handle.observe_history(a, vec![1, 3, 5]).expect("observe");
    handle.observe_history(b, vec![1, 3]).expect("observe");
    handle.observe_history(c, vec![1]).expect("observe");
    handle.observe_sent(a, sent_log(&[3, 5])).expect("observe");
    // Successor ahead of its predecessor.
    handle.observe_history(b, vec![1, 3, 6]).expect("observe");
    handle.observe_history(c, vec![2, 1]).expect("observe");
    let task = tokio::spawn(runner.run());

    let first = timeout(NOTIFICATION_TIMEOUT, violations.recv())
        .await
        .expect("timeout")
        .expect("closed");
    assert!(matches!(first, Violation::InvariantViolated { .. }));

    let mut rest = Vec::new();
    while let Ok(Some(violation)) = timeout(Duration::from_millis(100), violations.recv()).await {
        rest.push(violation);
    }
    assert!(rest
        .iter()
        .any(|v| matches!(v, Violation::UnsortedSequence { .. })));

    drop(handle);
    let runner = task.await.expect("join").expect("run");
    let stats = runner.monitor().stats();
    assert_eq!(stats.observations_accepted, 5);
    assert_eq!(stats.observations_rejected, 1);
}
