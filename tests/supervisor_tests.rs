//! Bridge supervision against real child processes

#![cfg(unix)]

mod common;

use common::{process_exists, wait_until, BridgeBehavior, FakeBridge};
use hkisy_node::SupervisorState;
use serial_test::serial;
use std::time::{Duration, Instant};

const SETTLE: Duration = Duration::from_secs(5);

#[tokio::test]
#[serial]
async fn test_start_launches_bridge_with_server_args() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.pid().is_some());

    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);
    assert_eq!(
        bridge.launches()[0],
        format!("server -config {}", bridge.config_path().display())
    );

    supervisor.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_start_twice_launches_once() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    supervisor.start().await.unwrap();

    assert_eq!(supervisor.launch_count(), 1);
    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bridge.launch_count(), 1);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_stop_waits_full_grace_after_early_exit() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let grace = Duration::from_millis(400);
    let supervisor = bridge.supervisor(grace, true);

    supervisor.start().await.unwrap();
    let pid = supervisor.pid().unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);

    // The bridge exits on SIGTERM right away, yet stop still takes the grace
    let started = Instant::now();
    supervisor.stop().await.unwrap();
    assert!(started.elapsed() >= grace);

    assert!(!supervisor.is_running());
    assert!(!process_exists(pid));
}

#[tokio::test]
#[serial]
async fn test_stop_when_stopped_takes_no_action() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let grace = Duration::from_millis(400);
    let supervisor = bridge.supervisor(grace, true);

    let started = Instant::now();
    supervisor.stop().await.unwrap();
    assert!(started.elapsed() < grace);
    assert_eq!(bridge.launch_count(), 0);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
#[serial]
async fn test_unplanned_exit_is_restarted() {
    let bridge = FakeBridge::new(BridgeBehavior::Crashing);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() >= 2).await);
    assert!(supervisor.restart_count() >= 1);
    assert!(supervisor.desired_running());

    supervisor.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_no_restart_after_stop() {
    let bridge = FakeBridge::new(BridgeBehavior::Crashing);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() >= 1).await);
    supervisor.stop().await.unwrap();

    let launches = bridge.launch_count();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(bridge.launch_count(), launches);
    assert!(!supervisor.is_running());
    assert!(!supervisor.desired_running());
}

#[tokio::test]
#[serial]
async fn test_bridge_ignoring_sigterm_is_killed_after_grace() {
    let bridge = FakeBridge::new(BridgeBehavior::IgnoresTerm);
    let supervisor = bridge.supervisor(Duration::from_millis(200), true);

    supervisor.start().await.unwrap();
    let pid = supervisor.pid().unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);

    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_running());
    assert!(wait_until(SETTLE, || !process_exists(pid)).await);
}

#[tokio::test]
#[serial]
async fn test_late_exit_after_stop_is_not_restarted() {
    let bridge = FakeBridge::new(BridgeBehavior::IgnoresTerm);
    let supervisor = bridge.supervisor(Duration::from_millis(200), false);

    supervisor.start().await.unwrap();
    let pid = supervisor.pid().unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);

    // Without force kill the bridge outlives the grace period
    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_running());
    assert!(process_exists(pid));

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    )
    .unwrap();
    assert!(wait_until(SETTLE, || !process_exists(pid)).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bridge.launch_count(), 1);
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
#[serial]
async fn test_start_after_stop_relaunches() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    supervisor.stop().await.unwrap();
    supervisor.start().await.unwrap();

    assert!(supervisor.is_running());
    assert_eq!(supervisor.launch_count(), 2);
    assert_eq!(supervisor.restart_count(), 0);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_grace_runs_from_sigterm_delivery() {
    let bridge = FakeBridge::new(BridgeBehavior::RecordsTerm);
    let grace = Duration::from_millis(400);
    let supervisor = bridge.supervisor(grace, true);

    supervisor.start().await.unwrap();
    assert!(wait_until(SETTLE, || bridge.launch_count() == 1).await);

    let stopping = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.stop().await })
    };

    let deadline = Instant::now() + SETTLE;
    let mut term_seen = None;
    while Instant::now() < deadline {
        if bridge.term_received() {
            term_seen = Some(Instant::now());
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let term_seen = term_seen.expect("bridge never saw SIGTERM");

    stopping.await.unwrap().unwrap();
    // Allow for the shell running its trap after delivery
    assert!(term_seen.elapsed() >= grace - Duration::from_millis(100));
    assert!(!supervisor.is_running());
}

#[tokio::test]
#[serial]
async fn test_shutdown_is_terminal() {
    let bridge = FakeBridge::new(BridgeBehavior::LongRunning);
    let supervisor = bridge.supervisor(Duration::from_millis(100), true);

    supervisor.start().await.unwrap();
    let pid = supervisor.pid().unwrap();
    supervisor.shutdown().await.unwrap();

    assert!(!supervisor.is_running());
    assert!(wait_until(SETTLE, || !process_exists(pid)).await);

    supervisor.start().await.unwrap();
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.launch_count(), 1);
    assert_eq!(bridge.launch_count(), 1);
}
