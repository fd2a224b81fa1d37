//! Provider factories and the provisioned provider registry
//!
//! Two tables live here:
//!
//! - [`ProviderFactories`] maps a backend kind to the factory that builds it.
//!   Backend crates add themselves to it before provisioning.
//! - [`ProviderRegistry`] maps a configured provider name to its live
//!   instance. It is built once by [`ProviderRegistry::provision`] and never
//!   written again, so lookups need no locking.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use local_dns_core::{LocalDnsConfig, ProviderFactories, ProviderRegistry};
//!
//! let mut factories = ProviderFactories::with_builtins();
//! local_dns_provider_opnsense::register(&mut factories);
//!
//! let config = LocalDnsConfig::from_file("/etc/local-dns.json")?;
//! let registry = ProviderRegistry::provision(&config.providers, &factories, config.debug)?;
//!
//! let provider = registry.resolve("lan").expect("provisioned");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::info;

use crate::backend::MemoryFactory;
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Table of provider factories keyed by backend kind
#[derive(Default)]
pub struct ProviderFactories {
    factories: HashMap<ProviderKind, Box<dyn DnsProviderFactory>>,
}

impl ProviderFactories {
    /// Create an empty factory table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory table with the backends built into this crate
    pub fn with_builtins() -> Self {
        let mut factories = Self::new();
        factories.register(ProviderKind::Memory, Box::new(MemoryFactory));
        factories
    }

    /// Register a DNS provider factory
    ///
    /// A later registration for the same kind replaces the earlier one.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use local_dns_core::registry::ProviderFactories;
    /// # use local_dns_core::config::{ProviderConfig, ProviderKind};
    /// # use local_dns_core::traits::{DnsProvider, DnsProviderFactory};
    /// # use std::sync::Arc;
    /// # struct MyFactory;
    /// # impl DnsProviderFactory for MyFactory {
    /// #     fn create(&self, _config: &ProviderConfig) -> local_dns_core::Result<Arc<dyn DnsProvider>> { unimplemented!() }
    /// # }
    /// let mut factories = ProviderFactories::new();
    /// factories.register(ProviderKind::Opnsense, Box::new(MyFactory));
    /// ```
    pub fn register(&mut self, kind: ProviderKind, factory: Box<dyn DnsProviderFactory>) {
        self.factories.insert(kind, factory);
    }

    /// Check if a backend kind is registered
    pub fn has(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// List all registered backend kinds
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the kind is not registered or creation fails
    pub fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| Error::config(format!("unsupported provider type: {}", config.kind)))?;

        factory.create(config)
    }
}

/// A live provider together with the configuration it was built from
#[derive(Clone)]
pub struct ProvisionedProvider {
    config: ProviderConfig,
    instance: Arc<dyn DnsProvider>,
}

impl ProvisionedProvider {
    /// The configuration the instance was built from
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The live instance
    pub fn instance(&self) -> &Arc<dyn DnsProvider> {
        &self.instance
    }
}

/// Read-only mapping of provider name to live provider
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProvisionedProvider>,
}

impl ProviderRegistry {
    /// Build every configured provider, all or nothing
    ///
    /// Providers are constructed in name order. The first construction
    /// failure aborts provisioning with an error naming that provider, and
    /// the instances built so far are dropped.
    ///
    /// With `debug` set, the connection attributes of each provider are
    /// logged as well. Credentials never are.
    pub fn provision(
        configs: &BTreeMap<String, ProviderConfig>,
        factories: &ProviderFactories,
        debug: bool,
    ) -> Result<Self> {
        let mut providers = HashMap::with_capacity(configs.len());

        for (name, config) in configs {
            let instance = factories.create(config).map_err(|e| {
                Error::config(format!("failed to create provider {}: {}", name, e))
            })?;

            if debug {
                info!(
                    name = %name,
                    provider_type = %config.kind,
                    hostname = %config.hostname,
                    dns_service = %config.dns_service,
                    insecure = config.insecure,
                    "initialized DNS provider"
                );
            } else {
                info!(name = %name, provider_type = %config.kind, "initialized DNS provider");
            }

            providers.insert(
                name.clone(),
                ProvisionedProvider {
                    config: config.clone(),
                    instance,
                },
            );
        }

        Ok(Self { providers })
    }

    /// Build a registry from already constructed instances
    pub fn from_instances<I, S>(instances: I) -> Self
    where
        I: IntoIterator<Item = (S, ProviderConfig, Arc<dyn DnsProvider>)>,
        S: Into<String>,
    {
        let providers = instances
            .into_iter()
            .map(|(name, config, instance)| (name.into(), ProvisionedProvider { config, instance }))
            .collect();
        Self { providers }
    }

    /// Resolve a provider name to its live instance
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn DnsProvider>> {
        self.providers.get(name).map(|p| Arc::clone(&p.instance))
    }

    /// Get a provisioned provider with its configuration
    pub fn get(&self, name: &str) -> Option<&ProvisionedProvider> {
        self.providers.get(name)
    }

    /// Check if a provider name is provisioned
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// List all provisioned provider names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of provisioned providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if no provider is provisioned
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
