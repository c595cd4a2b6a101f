//! A `Fetcher` that replays scripted responses.

use std::{
    collections::VecDeque,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use url::Url;

use crate::fetcher::{FetchError, Fetcher};

/// Returns queued responses in order, then keeps returning the fallback.
#[derive(Debug)]
pub struct ScriptedFetcher {
    queue: Mutex<VecDeque<Result<String, FetchError>>>,
    fallback: Mutex<Result<String, FetchError>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// A fetcher that always returns `body`.
    pub fn body(body: &str) -> Self {
        Self::with_fallback(Ok(body.to_string()))
    }

    /// A fetcher that always fails with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<String, FetchError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queues a response served before the fallback.
    pub fn push(&self, response: Result<String, FetchError>) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(response);
    }

    /// Replaces the fallback response.
    pub fn set_fallback(&self, response: Result<String, FetchError>) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = response;
    }

    /// Number of fetches so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match queued {
            Some(response) => response,
            None => self.fallback.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}
