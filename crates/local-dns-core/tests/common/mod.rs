//! Test doubles and common utilities for reconciliation contract tests
//!
//! The mock provider behaves like a stable backend: writes land in its
//! record table, so a later lookup sees them. Every call is counted.

#![allow(dead_code)]

use local_dns_core::error::{Error, Result};
use local_dns_core::traits::{DnsProvider, Record};
use local_dns_core::{ProviderConfig, ProviderRegistry, Reconciler};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A mock DnsProvider that tracks calls
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    /// Backend record table
    records: Arc<Mutex<HashMap<String, Record>>>,
    /// Call counter for find_record()
    find_call_count: Arc<AtomicUsize>,
    /// Recorded create_record() calls
    creates: Arc<Mutex<Vec<(String, IpAddr)>>>,
    /// Recorded update_record() calls
    updates: Arc<Mutex<Vec<(String, IpAddr)>>>,
    /// Make find_record() fail
    fail_find: Arc<AtomicBool>,
    /// Make create/update fail
    fail_write: Arc<AtomicBool>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that already holds `record`
    pub fn with_record(record: Record) -> Self {
        let mock = Self::new();
        mock.records
            .lock()
            .unwrap()
            .insert(record.domain.clone(), record);
        mock
    }

    pub fn failing_find(self) -> Self {
        self.fail_find.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_write(self) -> Self {
        self.fail_write.store(true, Ordering::SeqCst);
        self
    }

    /// Get the number of times find_record() was called
    pub fn find_call_count(&self) -> usize {
        self.find_call_count.load(Ordering::SeqCst)
    }

    /// Get the create_record() calls
    pub fn creates(&self) -> Vec<(String, IpAddr)> {
        self.creates.lock().unwrap().clone()
    }

    /// Get the update_record() calls
    pub fn updates(&self) -> Vec<(String, IpAddr)> {
        self.updates.lock().unwrap().clone()
    }

    /// Total number of writes issued
    pub fn write_count(&self) -> usize {
        self.creates.lock().unwrap().len() + self.updates.lock().unwrap().len()
    }

    /// Current backend state for `domain`
    pub fn record(&self, domain: &str) -> Option<Record> {
        self.records.lock().unwrap().get(domain).cloned()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_record(&self, domain: &str) -> Result<Option<Record>> {
        self.find_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(Error::query("mock", "connection refused"));
        }
        Ok(self.records.lock().unwrap().get(domain).cloned())
    }

    async fn create_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        self.creates.lock().unwrap().push((domain.to_string(), ip));
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(Error::write("mock", "backend rejected write"));
        }
        self.records
            .lock()
            .unwrap()
            .insert(domain.to_string(), Record::new(domain, ip.to_string(), true));
        Ok(())
    }

    async fn update_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        self.updates.lock().unwrap().push((domain.to_string(), ip));
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(Error::write("mock", "backend rejected write"));
        }
        self.records
            .lock()
            .unwrap()
            .insert(domain.to_string(), Record::new(domain, ip.to_string(), true));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to build a registry holding `mock` under `name`
pub fn registry_with(name: &str, mock: &MockDnsProvider) -> Arc<ProviderRegistry> {
    let instance: Arc<dyn DnsProvider> = Arc::new(mock.clone());
    Arc::new(ProviderRegistry::from_instances([(
        name,
        ProviderConfig::memory(),
        instance,
    )]))
}

/// Helper to build a reconciler with `mock` registered as "lan"
pub fn reconciler_with(mock: &MockDnsProvider, default_ip: Option<&str>) -> Reconciler {
    Reconciler::new(
        registry_with("lan", mock),
        default_ip.map(str::to_string),
        false,
    )
}

pub fn ip(raw: &str) -> IpAddr {
    raw.parse().unwrap()
}
