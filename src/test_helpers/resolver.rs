//! A `HostResolver` with a fixed answer.

use std::{
    net::IpAddr,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::resolver::{HostResolver, ResolveError};

/// Answers every lookup with the configured addresses.
#[derive(Debug)]
pub struct StaticResolver {
    addresses: Mutex<Vec<IpAddr>>,
    lookups: AtomicUsize,
}

impl StaticResolver {
    /// Resolves everything to `addresses`.
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses: Mutex::new(addresses), lookups: AtomicUsize::new(0) }
    }

    /// Changes the answer of later lookups.
    pub fn set_addresses(&self, addresses: Vec<IpAddr>) {
        *self.addresses.lock().unwrap_or_else(PoisonError::into_inner) = addresses;
    }

    /// Number of lookups so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.addresses.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
