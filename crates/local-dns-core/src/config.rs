//! Configuration types for the local DNS system
//!
//! The configuration is a JSON document:
//!
//! ```json
//! {
//!   "providers": {
//!     "lan": {
//!       "type": "opnsense",
//!       "hostname": "opnsense.lan",
//!       "api_key": "...",
//!       "api_secret": "...",
//!       "dns_service": "unbound",
//!       "insecure": true
//!     }
//!   },
//!   "default_ip": "192.168.1.50",
//!   "debug": false,
//!   "sites": [
//!     { "hosts": ["*.home.lan"], "provider": "lan" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use crate::adapter::extract_domain;
use crate::error::{Error, Result};

/// Main local DNS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalDnsConfig {
    /// Named DNS provider definitions
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// IP used when a site has no override
    #[serde(default, alias = "caddy_ip")]
    pub default_ip: Option<String>,

    /// Log connection attributes of providers (never secrets)
    #[serde(default)]
    pub debug: bool,

    /// Per-site bindings of a provider to a set of hosts
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl LocalDnsConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration document
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Add a named provider
    pub fn with_provider(mut self, name: impl Into<String>, provider: ProviderConfig) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Set the default IP
    pub fn with_default_ip(mut self, ip: impl Into<String>) -> Self {
        self.default_ip = Some(ip.into());
        self
    }

    /// Enable or disable debug logging of provider attributes
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Add a site binding
    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.sites.push(site);
        self
    }

    /// The default IP, treating an empty string as unset
    pub fn default_ip(&self) -> Option<&str> {
        self.default_ip.as_deref().filter(|ip| !ip.is_empty())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ip) = self.default_ip() {
            if ip.parse::<IpAddr>().is_err() {
                return Err(Error::config(format!("invalid default_ip address: {}", ip)));
            }
        }

        for (name, provider) in &self.providers {
            if name.is_empty() {
                return Err(Error::config("provider name cannot be empty"));
            }
            provider
                .validate()
                .map_err(|e| Error::config(format!("provider {}: {}", name, e)))?;
        }

        for site in &self.sites {
            site.validate()?;
            if !self.providers.contains_key(&site.provider) {
                return Err(Error::config(format!(
                    "provider {} not found in global configuration",
                    site.provider
                )));
            }
        }

        Ok(())
    }
}

/// Backend kinds a provider can be built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OPNsense firewall (Unbound or Dnsmasq)
    Opnsense,
    /// In-process record table
    Memory,
}

impl ProviderKind {
    /// Get the type tag used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Opnsense => "opnsense",
            ProviderKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DNS provider configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend kind
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// Host (or base URL) of the backend API
    #[serde(default)]
    pub hostname: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// API secret
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub api_secret: String,

    /// Which DNS service on the backend to manage (e.g. "unbound", "dnsmasq")
    #[serde(default)]
    pub dns_service: String,

    /// Accept invalid TLS certificates from the backend
    #[serde(default)]
    pub insecure: bool,
}

// Credentials stay out of Debug output
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("hostname", &self.hostname)
            .field("api_key", &"<REDACTED>")
            .field("api_secret", &"<REDACTED>")
            .field("dns_service", &self.dns_service)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a provider configuration of the given kind
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            hostname: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            dns_service: String::new(),
            insecure: false,
        }
    }

    /// Convenience constructor for the in-memory backend
    pub fn memory() -> Self {
        Self::new(ProviderKind::Memory)
    }

    /// Set the backend host
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the API credentials
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api_key = key.into();
        self.api_secret = secret.into();
        self
    }

    /// Set the managed DNS service
    pub fn with_dns_service(mut self, service: impl Into<String>) -> Self {
        self.dns_service = service.into();
        self
    }

    /// Relax TLS verification
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            ProviderKind::Opnsense => {
                if self.hostname.is_empty() {
                    return Err(Error::config("OPNsense hostname cannot be empty"));
                }
                if self.api_key.is_empty() || self.api_secret.is_empty() {
                    return Err(Error::config("OPNsense api_key and api_secret are required"));
                }
                Ok(())
            }
            ProviderKind::Memory => Ok(()),
        }
    }
}

/// Binding of a provider (and optional IP override) to a set of hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Host patterns: exact host, `*.suffix`, or `*`
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// Name of the provider that manages these hosts
    pub provider: String,

    /// IP to use instead of the global default
    #[serde(default)]
    pub ip_override: Option<String>,
}

impl SiteConfig {
    /// Create a catch-all site bound to a provider
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            hosts: default_hosts(),
            provider: provider.into(),
            ip_override: None,
        }
    }

    /// Restrict the site to the given host patterns
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the IP override
    pub fn with_ip_override(mut self, ip: impl Into<String>) -> Self {
        self.ip_override = Some(ip.into());
        self
    }

    /// Validate the site configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(Error::config("provider name is required"));
        }
        if self.hosts.is_empty() || self.hosts.iter().any(|h| h.is_empty()) {
            return Err(Error::config(format!(
                "site bound to {} has an empty host pattern",
                self.provider
            )));
        }
        // Hosts are matched with their port stripped
        if let Some(pattern) = self.hosts.iter().find(|h| extract_domain(h) != h.as_str()) {
            return Err(Error::config(format!(
                "host pattern {} must not include a port",
                pattern
            )));
        }
        if let Some(ip) = self.ip_override.as_deref().filter(|ip| !ip.is_empty()) {
            if ip.parse::<IpAddr>().is_err() {
                return Err(Error::config(format!("invalid ip_override address: {}", ip)));
            }
        }
        Ok(())
    }
}

fn default_hosts() -> Vec<String> {
    vec!["*".to_string()]
}
