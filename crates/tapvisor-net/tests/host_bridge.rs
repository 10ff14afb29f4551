//! Integration tests for tapvisor-net against the real host.
//!
//! These tests require:
//! - macOS or FreeBSD with `ifconfig` bridge support
//! - root privileges
//!
//! Run with: `sudo cargo test -p tapvisor-net -- --ignored`

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tapvisor_net::{Bridge, ConvergeMode, Ifconfig, NetError, Reconciler, WaitPolicy};

fn bridge_name() -> String {
    std::env::var("TAPVISOR_TEST_BRIDGE").unwrap_or_else(|_| "bridge42".to_string())
}

/// Test full bridge lifecycle: create -> converge again (no-op) -> destroy
#[tokio::test]
#[ignore = "requires root + BSD ifconfig bridges"]
async fn test_bridge_lifecycle() {
    let device = bridge_name();
    let reconciler = Reconciler::new(Arc::new(Ifconfig::default()));

    let desired = Bridge::new(&device)
        .with_address(Ipv4Addr::new(10, 42, 0, 1), Ipv4Addr::new(255, 255, 255, 0));

    let report = reconciler
        .converge(&desired, ConvergeMode::Additive)
        .await
        .expect("Failed to converge bridge");
    assert!(report.created);

    let observed = reconciler
        .discover(&device)
        .await
        .expect("Failed to query bridge")
        .expect("bridge should exist");
    assert_eq!(observed.ip, desired.ip);
    assert_eq!(observed.netmask, desired.netmask);

    let again = reconciler
        .converge(&desired, ConvergeMode::Additive)
        .await
        .expect("Failed to re-converge bridge");
    assert!(again.is_noop());

    reconciler.destroy(&device).await.expect("Failed to destroy bridge");
    assert!(matches!(
        reconciler.destroy(&device).await,
        Err(NetError::NotFound(_))
    ));
}

/// A member that never exists times out instead of hanging
#[tokio::test]
#[ignore = "requires root + BSD ifconfig bridges"]
async fn test_missing_member_times_out() {
    let device = bridge_name();
    let reconciler = Reconciler::new(Arc::new(Ifconfig::default())).with_wait_policy(WaitPolicy {
        attempts: 2,
        interval: Duration::from_millis(100),
    });

    let desired = Bridge::new(&device).with_member("tap-never");
    let err = reconciler
        .converge(&desired, ConvergeMode::Additive)
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::MemberTimeout { .. }));

    let _ = reconciler.destroy(&device).await;
}
