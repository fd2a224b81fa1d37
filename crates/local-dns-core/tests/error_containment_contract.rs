//! Contract Test: Error Containment
//!
//! Constraints verified:
//! - A failed lookup aborts reconciliation before any write
//! - A failed write is reported as a provider write error
//! - The request adapter never fails, whatever the engine reports
//! - Concurrent reconciliations through one shared provider all complete

mod common;

use common::*;
use local_dns_core::{Error, Record, RequestAdapter, SiteConfig};
use std::sync::Arc;

#[tokio::test]
async fn query_failure_aborts_before_write() {
    let mock = MockDnsProvider::new().failing_find();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let result = reconciler.reconcile("svc.local", "lan", None).await;

    assert!(matches!(result, Err(Error::ProviderQuery { .. })));
    assert_eq!(mock.write_count(), 0, "no write after a failed lookup");
}

#[tokio::test]
async fn write_failure_is_reported() {
    let mock = MockDnsProvider::with_record(Record::new("svc.local", "10.0.0.1", true))
        .failing_write();
    let reconciler = reconciler_with(&mock, Some("192.168.1.50"));

    let result = reconciler.reconcile("svc.local", "lan", None).await;

    assert!(matches!(result, Err(Error::ProviderWrite { .. })));
    assert_eq!(mock.updates().len(), 1);
}

#[tokio::test]
async fn adapter_swallows_every_failure() {
    let mock = MockDnsProvider::new().failing_find();
    let reconciler = Arc::new(reconciler_with(&mock, Some("192.168.1.50")));
    let adapter = RequestAdapter::provision(reconciler, &SiteConfig::new("lan")).unwrap();

    // Returns normally; the caller carries on serving the request
    assert!(adapter.handle("svc.local:443").await.is_none());
    assert_eq!(mock.find_call_count(), 1);
}

#[tokio::test]
async fn adapter_without_ip_still_returns() {
    let mock = MockDnsProvider::new();
    let reconciler = Arc::new(reconciler_with(&mock, None));
    let adapter = RequestAdapter::provision(reconciler, &SiteConfig::new("lan")).unwrap();

    assert!(adapter.handle("svc.local").await.is_none());
    assert_eq!(mock.find_call_count(), 0);
}

#[tokio::test]
async fn adapter_reports_successful_reconciliation() {
    let mock = MockDnsProvider::new();
    let reconciler = Arc::new(reconciler_with(&mock, Some("192.168.1.50")));
    let adapter = RequestAdapter::provision(reconciler, &SiteConfig::new("lan")).unwrap();

    let report = adapter.handle("svc.local:443").await.expect("reconciled");

    assert_eq!(report.domain, "svc.local");
    assert_eq!(mock.creates(), vec![("svc.local".to_string(), ip("192.168.1.50"))]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reconciliations_share_one_provider() {
    let mock = MockDnsProvider::new();
    let reconciler = Arc::new(reconciler_with(&mock, Some("192.168.1.50")));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let reconciler = Arc::clone(&reconciler);
            tokio::spawn(async move {
                let domain = format!("svc{}.local", i);
                reconciler.reconcile(&domain, "lan", None).await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("reconciliation succeeds");
    }

    assert_eq!(mock.creates().len(), 16);
    assert_eq!(mock.find_call_count(), 16);
}
