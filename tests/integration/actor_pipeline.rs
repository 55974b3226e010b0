//! End-to-end tests of the probe → state machine → notifier pipeline
//!
//! Cycles are driven with `probe_now` so every test is deterministic.

use assert_matches::assert_matches;
use host_monitoring::{
    actors::monitor::HostMonitorHandle,
    monitors::state::{AlertReason, AlertTransition, Phase, ProbeOutcome},
};
use pretty_assertions::assert_eq;

use crate::helpers::*;

async fn run_cycles(handle: &HostMonitorHandle, count: usize) -> Vec<Option<AlertTransition>> {
    let mut transitions = vec![];
    for _ in 0..count {
        transitions.push(handle.probe_now().await.unwrap().transition);
    }
    transitions
}

#[tokio::test]
async fn test_unreachable_streak_raises_then_healthy_clears() {
    let probe = ScriptedProbe::new([Step::Lost, Step::Lost, Step::Lost, Step::Reply(20)]);
    let (notifier, mut notified) = RecordingNotifier::new();
    let (handle, task) =
        HostMonitorHandle::spawn(create_test_monitor_config(2, 100), probe, notifier);

    let transitions = run_cycles(&handle, 3).await;
    assert!(transitions[..2].iter().all(Option::is_none));
    assert_matches!(
        transitions[2],
        Some(AlertTransition::Raised { reason: AlertReason::NoResponse, .. })
    );

    let transitions = run_cycles(&handle, 1).await;
    assert_matches!(transitions[0], Some(AlertTransition::Cleared { .. }));

    let notified = drain(&mut notified);
    assert_eq!(notified.len(), 2);
    assert_matches!(notified[0], AlertTransition::Raised { .. });
    assert_matches!(notified[1], AlertTransition::Cleared { .. });

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_high_rtt_with_zero_retries_raises_immediately() {
    let probe = ScriptedProbe::new([Step::Reply(150)]);
    let (notifier, mut notified) = RecordingNotifier::new();
    let (handle, task) =
        HostMonitorHandle::spawn(create_test_monitor_config(0, 100), probe, notifier);

    let report = handle.probe_now().await.unwrap();
    assert_eq!(
        report.outcome,
        ProbeOutcome::Degraded {
            latency: std::time::Duration::from_millis(150)
        }
    );
    assert_matches!(
        report.transition,
        Some(AlertTransition::Raised { reason: AlertReason::HighRtt, .. })
    );
    assert_eq!(drain(&mut notified).len(), 1);

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_healthy_between_faults_restarts_count() {
    let probe = ScriptedProbe::new([Step::Lost, Step::Reply(10), Step::Lost, Step::Lost]);
    let (notifier, _notified) = RecordingNotifier::new();
    let (handle, task) =
        HostMonitorHandle::spawn(create_test_monitor_config(1, 100), probe, notifier);

    let transitions = run_cycles(&handle, 4).await;
    assert!(transitions[..3].iter().all(Option::is_none));
    assert_matches!(
        transitions[3],
        Some(AlertTransition::Raised { reason: AlertReason::NoResponse, .. })
    );

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_persisting_fault_notifies_once() {
    let probe = ScriptedProbe::new(vec![Step::Lost; 10]);
    let (notifier, mut notified) = RecordingNotifier::new();
    let (handle, task) =
        HostMonitorHandle::spawn(create_test_monitor_config(1, 100), probe, notifier);

    run_cycles(&handle, 10).await;

    let notified = drain(&mut notified);
    assert_eq!(notified.len(), 1);

    let snapshot = handle.state().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Alarmed);
    assert_eq!(snapshot.consecutive_faults, 0);
    assert_eq!(snapshot.cycles, 10);
    assert_eq!(snapshot.last_outcome, Some(ProbeOutcome::Unreachable));

    handle.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_state_of_fresh_monitor() {
    let (notifier, _notified) = RecordingNotifier::new();
    let (handle, task) = HostMonitorHandle::spawn(
        create_test_monitor_config(3, 100),
        ScriptedProbe::new(Vec::<Step>::new()),
        notifier,
    );

    let snapshot = handle.state().await.unwrap();
    assert_eq!(snapshot.target, "127.0.0.1");
    assert_eq!(snapshot.phase, Phase::Normal);
    assert!(!snapshot.alarm_active);
    assert_eq!(snapshot.cycles, 0);
    assert_eq!(snapshot.last_outcome, None);

    handle.shutdown().await;
    task.await.unwrap();
}
