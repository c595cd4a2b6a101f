//! Hostname resolution with a TTL cache in front of it.

mod cache;

use std::net::IpAddr;

use async_trait::async_trait;
pub use cache::{CacheEntryInfo, CacheInfo, Resolution, ResolutionCache};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Errors returned by hostname resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The lookup itself failed.
    #[error("lookup of '{host}' failed: {reason}")]
    LookupFailed {
        /// The name that was looked up.
        host: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// The lookup succeeded but returned nothing and no earlier address is
    /// known.
    #[error("no addresses found for '{0}'")]
    NoAddresses(String),
}

/// Resolves a hostname to its addresses.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Looks up every address of `host`.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolves through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let addresses = tokio::net::lookup_host((host, 0)).await.map_err(|e| {
            ResolveError::LookupFailed { host: host.to_string(), reason: e.to_string() }
        })?;
        Ok(addresses.map(|socket| socket.ip()).collect())
    }
}
