//! Reconciliation engine
//!
//! The Reconciler brings one domain's address record in line with the
//! desired IP:
//! - Resolving the provider by name from the [`ProviderRegistry`]
//! - Choosing the desired IP (site override, else global default)
//! - Reading the record from the provider
//! - Writing only when the record is missing, points elsewhere, or is disabled
//!
//! ## Decision
//!
//! ```text
//!              find_record_for(domain, ip)
//!                          │
//!        ┌─────────────────┼──────────────────────┐
//!        │                 │                      │
//!        ▼                 ▼                      ▼
//!     absent      present, same IP,      present, other IP
//!        │           enabled               or disabled
//!        ▼                 │                      │
//!  create_record           ▼                      ▼
//!                     (no write)            update_record
//! ```
//!
//! Each call is a self-contained read-then-maybe-write. There is no retry,
//! no batching and no per-domain lock: two concurrent calls for the same
//! domain may both write, and the backend keeps the last one.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::LocalDnsConfig;
use crate::error::{Error, Result};
use crate::registry::ProviderRegistry;

/// What a reconciliation did to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Record already pointed at the desired IP and was enabled (no write)
    Unchanged,
    /// Record did not exist and was created
    Created,
    /// Record existed and was repointed and/or re-enabled
    Updated {
        /// The address the record held before
        previous_ip: String,
        /// Whether the record was enabled before
        was_enabled: bool,
    },
}

impl ReconcileOutcome {
    /// Whether a write was issued
    pub fn wrote(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Unchanged => f.write_str("no-op"),
            ReconcileOutcome::Created => f.write_str("created"),
            ReconcileOutcome::Updated { .. } => f.write_str("updated"),
        }
    }
}

/// Result of one successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Domain that was reconciled
    pub domain: String,
    /// Provider name it was reconciled against
    pub provider: String,
    /// Desired IP
    pub ip: IpAddr,
    /// What happened
    pub outcome: ReconcileOutcome,
    /// When the provider was queried
    pub checked_at: DateTime<Utc>,
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Reconciliation finished (with or without a write)
    Succeeded(ReconcileReport),

    /// Reconciliation aborted
    Failed {
        domain: String,
        provider: String,
        error: String,
    },
}

/// Core reconciliation engine
///
/// Shared behind an `Arc` by every request adapter. It holds no mutable
/// state, so concurrent calls need no coordination beyond what each
/// provider does internally.
pub struct Reconciler {
    /// Provisioned providers
    registry: Arc<ProviderRegistry>,

    /// IP used when the caller has no override
    default_ip: Option<String>,

    /// Log provider connection attributes
    debug: bool,

    /// Event sender for external monitoring
    event_tx: Option<mpsc::Sender<ReconcileEvent>>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// An empty `default_ip` is treated as unset.
    pub fn new(registry: Arc<ProviderRegistry>, default_ip: Option<String>, debug: bool) -> Self {
        Self {
            registry,
            default_ip: default_ip.filter(|ip| !ip.is_empty()),
            debug,
            event_tx: None,
        }
    }

    /// Create a reconciler from the global configuration
    ///
    /// Fails with a configuration error if the default IP does not parse.
    pub fn from_config(registry: Arc<ProviderRegistry>, config: &LocalDnsConfig) -> Result<Self> {
        if let Some(ip) = config.default_ip() {
            ip.parse::<IpAddr>()
                .map_err(|_| Error::config(format!("invalid default_ip address: {}", ip)))?;
        }
        Ok(Self::new(
            registry,
            config.default_ip().map(str::to_string),
            config.debug,
        ))
    }

    /// Attach a bounded event channel
    ///
    /// When the channel is full, events are dropped with a warning.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// The provider registry
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The global default IP
    pub fn default_ip(&self) -> Option<&str> {
        self.default_ip.as_deref()
    }

    /// Pick and validate the desired IP
    ///
    /// A non-empty override wins over the default.
    pub fn desired_ip(&self, ip_override: Option<&str>) -> Result<IpAddr> {
        let raw = ip_override
            .filter(|ip| !ip.is_empty())
            .or(self.default_ip.as_deref())
            .ok_or(Error::NoIpConfigured)?;

        raw.parse().map_err(|_| Error::invalid_ip(raw))
    }

    /// Reconcile `domain` against the named provider
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: The record now points at the desired IP
    /// - `Err(Error::ProviderNotFound)`: `provider_name` is not provisioned
    /// - `Err(Error::NoIpConfigured | Error::InvalidIp)`: No usable desired IP;
    ///   the provider is not contacted
    /// - `Err(Error::ProviderQuery)`: The lookup failed; nothing was written
    /// - `Err(Error::ProviderWrite)`: The create or update failed
    pub async fn reconcile(
        &self,
        domain: &str,
        provider_name: &str,
        ip_override: Option<&str>,
    ) -> Result<ReconcileReport> {
        let result = self.reconcile_inner(domain, provider_name, ip_override).await;

        match &result {
            Ok(report) => self.emit_event(ReconcileEvent::Succeeded(report.clone())),
            Err(e) => self.emit_event(ReconcileEvent::Failed {
                domain: domain.to_string(),
                provider: provider_name.to_string(),
                error: e.to_string(),
            }),
        }

        result
    }

    async fn reconcile_inner(
        &self,
        domain: &str,
        provider_name: &str,
        ip_override: Option<&str>,
    ) -> Result<ReconcileReport> {
        let provisioned = self
            .registry
            .get(provider_name)
            .ok_or_else(|| Error::provider_not_found(provider_name))?;
        let provider = provisioned.instance();

        let ip = self.desired_ip(ip_override)?;

        info!(domain = %domain, ip = %ip, provider = %provider_name, "handling domain");
        if self.debug {
            let config = provisioned.config();
            debug!(
                provider = %provider_name,
                hostname = %config.hostname,
                dns_service = %config.dns_service,
                insecure = config.insecure,
                "provider connection attributes"
            );
        }

        let checked_at = Utc::now();
        let existing = provider
            .find_record_for(domain, ip)
            .await
            .map_err(|e| as_query_error(provider_name, e))?;

        let outcome = match existing {
            Some(record) if record.points_to(ip) => {
                info!(domain = %domain, "DNS record already exists and is correct");
                ReconcileOutcome::Unchanged
            }
            Some(record) => {
                info!(
                    domain = %domain,
                    previous_ip = %record.ip,
                    enabled = record.enabled,
                    "updating existing DNS record"
                );
                provider
                    .update_record(domain, ip)
                    .await
                    .map_err(|e| as_write_error(provider_name, e))?;
                ReconcileOutcome::Updated {
                    previous_ip: record.ip,
                    was_enabled: record.enabled,
                }
            }
            None => {
                info!(domain = %domain, "creating new DNS record");
                provider
                    .create_record(domain, ip)
                    .await
                    .map_err(|e| as_write_error(provider_name, e))?;
                ReconcileOutcome::Created
            }
        };

        Ok(ReconcileReport {
            domain: domain.to_string(),
            provider: provider_name.to_string(),
            ip,
            outcome,
            checked_at,
        })
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.try_send(event).is_err() {
                warn!("Event channel full, dropping reconcile event");
            }
        }
    }
}

// Provider errors keep their variant; anything else is attributed to the step.
fn as_query_error(provider: &str, err: Error) -> Error {
    match err {
        Error::ProviderQuery { .. } => err,
        other => Error::query(provider, other.to_string()),
    }
}

fn as_write_error(provider: &str, err: Error) -> Error {
    match err {
        Error::ProviderWrite { .. } => err,
        other => Error::write(provider, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryProvider;
    use crate::config::ProviderConfig;
    use crate::traits::{DnsProvider, Record};

    fn reconciler_with(provider: MemoryProvider, default_ip: Option<&str>) -> Reconciler {
        let instance: Arc<dyn DnsProvider> = Arc::new(provider);
        let registry =
            ProviderRegistry::from_instances([("lan", ProviderConfig::memory(), instance)]);
        Reconciler::new(Arc::new(registry), default_ip.map(str::to_string), false)
    }

    #[test]
    fn test_ip_precedence() {
        let reconciler = reconciler_with(MemoryProvider::new(), Some("192.168.1.50"));

        assert_eq!(
            reconciler.desired_ip(Some("10.0.0.7")).unwrap(),
            "10.0.0.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            reconciler.desired_ip(None).unwrap(),
            "192.168.1.50".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            reconciler.desired_ip(Some("")).unwrap(),
            "192.168.1.50".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_no_ip_configured() {
        let reconciler = reconciler_with(MemoryProvider::new(), None);
        assert!(matches!(
            reconciler.desired_ip(None),
            Err(Error::NoIpConfigured)
        ));
    }

    #[test]
    fn test_invalid_default_rejected_by_from_config() {
        let config = LocalDnsConfig::new().with_default_ip("not-an-ip");
        let result = Reconciler::from_config(Arc::new(ProviderRegistry::default()), &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_reenables_disabled_record() {
        let provider = MemoryProvider::new();
        provider
            .insert(Record::new("svc.local", "192.168.1.50", false))
            .await;
        let reconciler = reconciler_with(provider.clone(), Some("192.168.1.50"));

        let report = reconciler.reconcile("svc.local", "lan", None).await.unwrap();

        assert_eq!(
            report.outcome,
            ReconcileOutcome::Updated {
                previous_ip: "192.168.1.50".to_string(),
                was_enabled: false,
            }
        );
        assert!(provider.get("svc.local").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_events_report_success_and_failure() {
        let (reconciler, mut events) =
            reconciler_with(MemoryProvider::new(), Some("192.168.1.50")).with_events(8);

        reconciler.reconcile("svc.local", "lan", None).await.unwrap();
        reconciler.reconcile("svc.local", "ghost", None).await.unwrap_err();

        match events.recv().await.unwrap() {
            ReconcileEvent::Succeeded(report) => {
                assert_eq!(report.outcome, ReconcileOutcome::Created);
                assert_eq!(report.provider, "lan");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            ReconcileEvent::Failed { provider, error, .. } => {
                assert_eq!(provider, "ghost");
                assert!(error.contains("ghost"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ReconcileOutcome::Unchanged.to_string(), "no-op");
        assert_eq!(ReconcileOutcome::Created.to_string(), "created");
        assert!(!ReconcileOutcome::Unchanged.wrote());
        assert!(ReconcileOutcome::Created.wrote());
    }
}
