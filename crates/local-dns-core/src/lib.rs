// # local-dns-core
//
// Core library for keeping local DNS records in step with reverse-proxy
// traffic.
//
// ## Architecture Overview
//
// Whenever a request arrives for a hostname, the matching DNS record is made
// to point at the proxy:
// - **DnsProvider**: Trait for finding, creating and updating address records
// - **ProviderRegistry**: Named provider instances, provisioned once at startup
// - **Reconciler**: Per-request read-decide-write against one provider
// - **RequestAdapter / SiteRouter**: Turn a request host into a reconciliation
//   without ever failing the request
//
// ## Design Principles
//
// 1. **Idempotency**: A correct record is never rewritten
// 2. **Fail-fast provisioning**: All providers come up, or startup aborts
// 3. **Contained request-time errors**: DNS failures are logged, never surfaced
//    to the request
// 4. **Plugin-based backends**: Backends register factories by kind

pub mod traits;
pub mod engine;
pub mod registry;
pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{DnsProvider, DnsProviderFactory, Record};
pub use engine::{ReconcileEvent, ReconcileOutcome, ReconcileReport, Reconciler};
pub use registry::{ProviderFactories, ProviderRegistry};
pub use adapter::{RequestAdapter, SiteRouter, extract_domain};
pub use backend::MemoryProvider;
pub use config::{LocalDnsConfig, ProviderConfig, ProviderKind, SiteConfig};
pub use error::{Error, Result};
