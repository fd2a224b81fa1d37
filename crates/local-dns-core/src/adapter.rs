//! Request adapter
//!
//! Bridges an inbound request to the [`Reconciler`]. The adapter takes the
//! request's target host, reconciles it, and reports the result through
//! logging only: whatever happens on the DNS side, the caller goes on to
//! serve the request unchanged.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::SiteConfig;
use crate::engine::{ReconcileReport, Reconciler};
use crate::error::{Error, Result};

/// Strip an optional trailing `:port` from a request host
///
/// Splits on the last colon. A bracketed IPv6 literal without a port is
/// returned as is.
///
/// ```
/// use local_dns_core::adapter::extract_domain;
///
/// assert_eq!(extract_domain("service.example.com:8080"), "service.example.com");
/// assert_eq!(extract_domain("service.example.com"), "service.example.com");
/// ```
pub fn extract_domain(host: &str) -> &str {
    if host.starts_with('[') && host.ends_with(']') {
        return host;
    }
    match host.rfind(':') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

/// Reconciles request hosts against one statically bound provider
#[derive(Clone)]
pub struct RequestAdapter {
    provider: String,
    ip_override: Option<String>,
    reconciler: Arc<Reconciler>,
}

impl RequestAdapter {
    /// Bind a site to the reconciler
    ///
    /// The site's provider must already be provisioned and its override, if
    /// any, must be a valid IP. Both are configuration errors otherwise.
    pub fn provision(reconciler: Arc<Reconciler>, site: &SiteConfig) -> Result<Self> {
        if site.provider.is_empty() {
            return Err(Error::config("provider name is required"));
        }
        if !reconciler.registry().contains(&site.provider) {
            return Err(Error::config(format!(
                "provider {} not found in global configuration",
                site.provider
            )));
        }

        let ip_override = site.ip_override.clone().filter(|ip| !ip.is_empty());
        if let Some(ip) = &ip_override {
            ip.parse::<IpAddr>()
                .map_err(|_| Error::config(format!("invalid ip_override address: {}", ip)))?;
        }

        Ok(Self {
            provider: site.provider.clone(),
            ip_override,
            reconciler,
        })
    }

    /// Name of the bound provider
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The site's IP override
    pub fn ip_override(&self) -> Option<&str> {
        self.ip_override.as_deref()
    }

    /// Reconcile the domain of `host`, returning the engine's result
    pub async fn reconcile(&self, host: &str) -> Result<ReconcileReport> {
        let domain = extract_domain(host);
        self.reconciler
            .reconcile(domain, &self.provider, self.ip_override.as_deref())
            .await
    }

    /// Reconcile the domain of `host`, logging any failure
    ///
    /// Never fails. Returns the report when reconciliation succeeded so
    /// callers can observe it.
    pub async fn handle(&self, host: &str) -> Option<ReconcileReport> {
        match self.reconcile(host).await {
            Ok(report) => {
                info!(
                    domain = %report.domain,
                    ip = %report.ip,
                    provider = %report.provider,
                    outcome = %report.outcome,
                    "reconciled DNS record"
                );
                Some(report)
            }
            Err(e) => {
                error!(
                    domain = %extract_domain(host),
                    provider = %self.provider,
                    error = %e,
                    "failed to handle domain"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Suffix(String),
    Exact(String),
}

impl HostPattern {
    fn parse(pattern: &str) -> Self {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            HostPattern::Any
        } else if let Some(suffix) = pattern.strip_prefix("*.") {
            HostPattern::Suffix(format!(".{}", suffix))
        } else {
            HostPattern::Exact(pattern)
        }
    }

    fn matches(&self, domain: &str) -> bool {
        match self {
            HostPattern::Any => true,
            HostPattern::Suffix(suffix) => {
                domain.len() > suffix.len() && domain.ends_with(suffix.as_str())
            }
            HostPattern::Exact(host) => domain == host,
        }
    }
}

/// Ordered site bindings; the first site whose patterns match a host wins
#[derive(Clone, Default)]
pub struct SiteRouter {
    sites: Vec<(Vec<HostPattern>, RequestAdapter)>,
}

impl SiteRouter {
    /// Provision an adapter for every site
    pub fn provision(reconciler: Arc<Reconciler>, sites: &[SiteConfig]) -> Result<Self> {
        let sites = sites
            .iter()
            .map(|site| {
                site.validate()?;
                let patterns = site.hosts.iter().map(|h| HostPattern::parse(h)).collect();
                let adapter = RequestAdapter::provision(Arc::clone(&reconciler), site)?;
                Ok((patterns, adapter))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sites })
    }

    /// Find the adapter responsible for `host`
    pub fn adapter_for(&self, host: &str) -> Option<&RequestAdapter> {
        let domain = extract_domain(host).to_ascii_lowercase();
        self.sites
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|p| p.matches(&domain)))
            .map(|(_, adapter)| adapter)
    }

    /// Reconcile `host` with the matching site, if any
    ///
    /// Never fails; hosts no site claims are skipped.
    pub async fn handle(&self, host: &str) -> Option<ReconcileReport> {
        match self.adapter_for(host) {
            Some(adapter) => adapter.handle(host).await,
            None => {
                debug!(host = %host, "no site bound to host, skipping");
                None
            }
        }
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Check if there are no sites
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
