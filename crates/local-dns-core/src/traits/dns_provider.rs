// # DNS Provider Trait
//
// Defines the interface the reconciliation engine uses to read and write
// address records on a DNS backend.
//
// ## Implementations
//
// - OPNsense (Unbound / Dnsmasq): `local-dns-provider-opnsense` crate
// - In-memory: `local_dns_core::backend::MemoryProvider`
//
// ## Usage
//
// ```rust,ignore
// use local_dns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     match provider.find_record("svc.home.lan").await? {
//         Some(record) => println!("{} -> {}", record.domain, record.ip),
//         None => provider.create_record("svc.home.lan", "192.168.1.50".parse()?).await?,
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Provider-observed state of a domain's address mapping
///
/// A snapshot valid only at the instant of the query. Nothing caches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The domain name
    pub domain: String,
    /// The address currently bound, as reported by the backend
    pub ip: String,
    /// Whether the backend serves this record
    pub enabled: bool,
}

impl Record {
    /// Create a record snapshot
    pub fn new(domain: impl Into<String>, ip: impl Into<String>, enabled: bool) -> Self {
        Self {
            domain: domain.into(),
            ip: ip.into(),
            enabled,
        }
    }

    /// Whether the record is enabled and resolves to `ip`
    ///
    /// Addresses are compared parsed, so `::1` and `0:0:0:0:0:0:0:1` match.
    /// An address the backend reports that does not parse never matches.
    pub fn points_to(&self, ip: IpAddr) -> bool {
        self.enabled && self.ip.parse::<IpAddr>().is_ok_and(|current| current == ip)
    }
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// One instance is shared by every in-flight reconciliation, so all methods
/// may be called concurrently. Implementations keep any session state
/// internally and must be safe under that sharing.
///
/// # Responsibilities
///
/// ## Allowed
/// - ✅ Perform HTTP/HTTPS API calls to their own backend
/// - ✅ Parse backend-specific responses
/// - ✅ Apply/commit backend configuration after a write
///
/// ## Forbidden
/// - ❌ Decide whether a write is needed (owned by `Reconciler`)
/// - ❌ Cache record state between calls
/// - ❌ Retry or back off (a failed reconciliation is simply logged)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the current record for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Record))`: The record exists
    /// - `Ok(None)`: No record exists (this is not an error)
    /// - `Err(Error::ProviderQuery)`: Transport, auth or parse failure
    async fn find_record(&self, domain: &str) -> Result<Option<Record>>;

    /// Look up the record for `domain` that would hold `ip`
    ///
    /// Backends that keep one record per address family override this to
    /// return only the record of `ip`'s family, so an A and an AAAA record
    /// for the same name are reconciled independently. The default ignores
    /// `ip` and calls [`DnsProvider::find_record`].
    async fn find_record_for(&self, domain: &str, _ip: IpAddr) -> Result<Option<Record>> {
        self.find_record(domain).await
    }

    /// Create a new address record
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The backend accepted the record
    /// - `Err(Error::ProviderWrite)`: Duplicate, invalid, auth or transport failure
    async fn create_record(&self, domain: &str, ip: IpAddr) -> Result<()>;

    /// Point an existing record at `ip` and make sure it is enabled
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The backend accepted the change
    /// - `Err(Error::ProviderWrite)`: Same conditions as [`DnsProvider::create_record`]
    async fn update_record(&self, domain: &str, ip: IpAddr) -> Result<()>;

    /// Get the provider type name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
///
/// Construction happens once, during provisioning. A failure here is a
/// configuration error and aborts startup.
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: The live provider
    /// - `Err(Error::Config)`: Unusable configuration
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>>;
}
