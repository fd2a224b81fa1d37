// # Memory DNS Provider
//
// In-process implementation of DnsProvider.
//
// ## Purpose
//
// Holds address records in a table owned by the process. Nothing reaches a
// real DNS server, which makes it useful for dry runs and for exercising the
// reconciliation engine without a backend.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - The next request for a domain after a restart creates its record again

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory, Record};

/// In-memory DNS provider
///
/// Records are keyed by lowercased domain in a HashMap protected by a RwLock.
/// Clones share the same table.
///
/// # Example
///
/// ```rust,no_run
/// use local_dns_core::backend::MemoryProvider;
/// use local_dns_core::DnsProvider;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///
///     provider.create_record("svc.local", "192.168.1.50".parse()?).await?;
///
///     let record = provider.find_record("svc.local").await?;
///     assert_eq!(record.map(|r| r.ip), Some("192.168.1.50".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<HashMap<String, Record>>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the write checks
    pub async fn insert(&self, record: Record) {
        let mut guard = self.inner.write().await;
        guard.insert(record.domain.to_ascii_lowercase(), record);
    }

    /// Get a record without going through the provider contract
    pub async fn get(&self, domain: &str) -> Option<Record> {
        self.inner
            .read()
            .await
            .get(&domain.to_ascii_lowercase())
            .cloned()
    }

    /// Get the number of records
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if there are no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn find_record(&self, domain: &str) -> Result<Option<Record>> {
        Ok(self.get(domain).await)
    }

    async fn create_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        let mut guard = self.inner.write().await;
        let key = domain.to_ascii_lowercase();
        if guard.contains_key(&key) {
            return Err(Error::write(
                "memory",
                format!("record already exists: {}", domain),
            ));
        }
        guard.insert(key, Record::new(domain, ip.to_string(), true));
        Ok(())
    }

    async fn update_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(&domain.to_ascii_lowercase())
            .ok_or_else(|| Error::write("memory", format!("record not found: {}", domain)))?;
        record.ip = ip.to_string();
        record.enabled = true;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory providers
pub struct MemoryFactory;

impl DnsProviderFactory for MemoryFactory {
    fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        Ok(Arc::new(MemoryProvider::new()))
    }
}
