//! A TTL cache in front of a [`HostResolver`] that falls back to the last
//! known address when a live lookup fails.

use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::RwLock, time::Instant};

use super::{HostResolver, ResolveError};

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    address: IpAddr,
    expires_at: Instant,
    resolved_at: DateTime<Utc>,
}

/// The address a name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved, cached or stale address.
    pub address: IpAddr,
    /// True when a fresh lookup returned an address different from the
    /// previously cached one.
    pub changed: bool,
    /// Set when a live lookup failed and a stale address was returned.
    pub error: Option<ResolveError>,
}

impl Resolution {
    fn unchanged(address: IpAddr) -> Self {
        Self { address, changed: false, error: None }
    }
}

/// A cached entry as reported by [`ResolutionCache::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    /// The cached name.
    pub host: String,
    /// The cached address.
    pub address: IpAddr,
    /// When the address was resolved.
    pub resolved_at: DateTime<Utc>,
    /// Seconds until the entry expires, zero when already expired.
    pub expires_in_secs: u64,
}

/// Snapshot of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
    /// Cached entries sorted by host.
    pub entries: Vec<CacheEntryInfo>,
}

/// Name to address cache with TTL expiry, stale fallback on lookup failure
/// and change detection.
pub struct ResolutionCache {
    resolver: Arc<dyn HostResolver>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

/// Picks the first IPv4 address, falling back to the first address.
fn preferred_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    addresses.iter().find(|address| address.is_ipv4()).or_else(|| addresses.first()).copied()
}

impl ResolutionCache {
    /// Creates an empty cache. A zero TTL selects the default of five minutes.
    pub fn new(resolver: Arc<dyn HostResolver>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        Self { resolver, ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// The configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolves `name`, going to the resolver only on a miss or an expired
    /// entry.
    pub async fn resolve(&self, name: &str) -> Result<Resolution, ResolveError> {
        let name = name.trim_start_matches('[').trim_end_matches(']');
        if let Ok(address) = name.parse::<IpAddr>() {
            return Ok(Resolution::unchanged(address));
        }

        let stale = {
            let entries = self.entries.read().await;
            match entries.get(name) {
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Ok(Resolution::unchanged(entry.address));
                }
                Some(entry) => Some(entry.address),
                None => None,
            }
        };

        let addresses = match self.resolver.lookup(name).await {
            Ok(addresses) => addresses,
            Err(e) => {
                return match stale {
                    Some(address) => {
                        tracing::warn!(host = name, %address, error = %e, "Lookup failed, using stale address.");
                        Ok(Resolution { address, changed: false, error: Some(e) })
                    }
                    None => Err(e),
                };
            }
        };

        let Some(address) = preferred_address(&addresses) else {
            return match stale {
                Some(address) => Ok(Resolution::unchanged(address)),
                None => Err(ResolveError::NoAddresses(name.to_string())),
            };
        };

        let mut entries = self.entries.write().await;
        let previous = entries.get(name).map(|entry| entry.address).or(stale);
        let changed = previous.is_some_and(|previous| previous != address);
        if changed {
            tracing::info!(host = name, ?previous, %address, "Resolved address changed.");
        }
        entries.insert(
            name.to_string(),
            CacheEntry { address, expires_at: Instant::now() + self.ttl, resolved_at: Utc::now() },
        );

        Ok(Resolution { address, changed, error: None })
    }

    /// The cached address of `name`, if present and not expired.
    pub async fn cached_address(&self, name: &str) -> Option<IpAddr> {
        let entries = self.entries.read().await;
        entries.get(name).filter(|entry| Instant::now() < entry.expires_at).map(|entry| entry.address)
    }

    /// Expires the entry of `name` so the next resolve performs a lookup. The
    /// old address remains available as a stale fallback.
    pub async fn invalidate(&self, name: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(name) {
            entry.expires_at = Instant::now();
        }
    }

    /// Removes expired entries and returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Snapshot of the cache contents.
    pub async fn info(&self) -> CacheInfo {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut entries: Vec<_> = entries
            .iter()
            .map(|(host, entry)| CacheEntryInfo {
                host: host.clone(),
                address: entry.address,
                resolved_at: entry.resolved_at,
                expires_in_secs: entry.expires_at.saturating_duration_since(now).as_secs(),
            })
            .collect();
        entries.sort_by(|a, b| a.host.cmp(&b.host));

        CacheInfo { ttl_secs: self.ttl.as_secs(), entries }
    }
}
