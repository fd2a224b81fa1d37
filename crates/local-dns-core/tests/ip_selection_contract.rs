//! Contract Test: Desired IP Selection and Validation
//!
//! Constraints verified:
//! - A site override wins over the global default
//! - The global default is used when there is no override
//! - With neither, reconciliation fails with NoIpConfigured
//! - A malformed IP fails with InvalidIp before the provider is contacted
//! - An unknown provider fails with ProviderNotFound

mod common;

use common::*;
use local_dns_core::Error;
use tokio_test::assert_err;

#[tokio::test]
async fn override_takes_precedence_over_default() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let report = reconciler
        .reconcile("svc.local", "lan", Some("10.0.0.7"))
        .await
        .unwrap();

    assert_eq!(report.ip, ip("10.0.0.7"));
    assert_eq!(mock.creates(), vec![("svc.local".to_string(), ip("10.0.0.7"))]);
}

#[tokio::test]
async fn default_used_without_override() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let report = reconciler.reconcile("svc.local", "lan", None).await.unwrap();

    assert_eq!(report.ip, ip("192.168.1.50"));
}

#[tokio::test]
async fn ipv6_default_is_accepted() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, Some("fd00::50"));

    reconciler.reconcile("svc.local", "lan", None).await.unwrap();

    assert_eq!(mock.creates(), vec![("svc.local".to_string(), ip("fd00::50"))]);
}

#[tokio::test]
async fn no_ip_configured_fails_without_provider_call() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, None);

    let result = reconciler.reconcile("svc.local", "lan", None).await;

    assert!(matches!(result, Err(Error::NoIpConfigured)));
    assert_eq!(mock.find_call_count(), 0);
}

#[tokio::test]
async fn malformed_override_fails_before_provider_call() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let result = reconciler
        .reconcile("svc.local", "lan", Some("999.1.1.1"))
        .await;

    match result {
        Err(Error::InvalidIp(raw)) => assert_eq!(raw, "999.1.1.1"),
        other => panic!("expected InvalidIp, got {:?}", other),
    }
    assert_eq!(mock.find_call_count(), 0);
    assert_eq!(mock.write_count(), 0);
}

#[tokio::test]
async fn unknown_provider_fails_with_provider_not_found() {
    let mock = MockDnsProvider::new();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let err = assert_err!(reconciler.reconcile("svc.local", "ghost", None).await);

    assert!(matches!(err, Error::ProviderNotFound(ref name) if name == "ghost"));
    assert!(!err.is_fatal());
    assert_eq!(mock.find_call_count(), 0);
}
