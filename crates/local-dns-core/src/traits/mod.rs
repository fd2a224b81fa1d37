//! Core traits for the local DNS system
//!
//! This module defines the abstract interfaces that all backends must follow.
//!
//! - [`DnsProvider`]: Find, create and update address records via a backend API
//! - [`DnsProviderFactory`]: Build a [`DnsProvider`] from its configuration

pub mod dns_provider;

pub use dns_provider::{DnsProvider, DnsProviderFactory, Record};
