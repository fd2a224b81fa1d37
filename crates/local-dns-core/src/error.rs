//! Error types for the local DNS system
//!
//! Errors fall into two groups. [`Error::Config`] is raised while provisioning
//! and aborts startup. Every other variant is raised while reconciling a single
//! request and is contained to that request.

use thiserror::Error;

/// Result type alias for local DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the local DNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or provisioning errors (fatal to startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced provider name has no live instance
    #[error("DNS provider not found: {0}")]
    ProviderNotFound(String),

    /// Neither an override nor a default IP is available
    #[error(
        "no IP address configured: set either ip_override on the site or default_ip in the global config"
    )]
    NoIpConfigured,

    /// The desired IP failed syntactic validation
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    /// Reading record state from a backend failed
    #[error("failed to find existing record ({provider}): {message}")]
    ProviderQuery {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A backend rejected or failed a create/update
    #[error("failed to write record ({provider}): {message}")]
    ProviderWrite {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "provider not found" error
    pub fn provider_not_found(name: impl Into<String>) -> Self {
        Self::ProviderNotFound(name.into())
    }

    /// Create an invalid IP error
    pub fn invalid_ip(ip: impl Into<String>) -> Self {
        Self::InvalidIp(ip.into())
    }

    /// Create a provider query error
    pub fn query(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderQuery {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider write error
    pub fn write(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderWrite {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error must abort process startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
