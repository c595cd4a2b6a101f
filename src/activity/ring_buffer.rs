//! A fixed-capacity history that overwrites its oldest element when full.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::Event;

/// Fixed-capacity buffer. Readers get a copy, oldest element first.
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: RwLock<VecDeque<T>>,
}

impl<T: Clone> RingBuffer<T> {
    /// Creates an empty buffer. A zero capacity keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: RwLock::new(VecDeque::with_capacity(capacity)) }
    }

    /// Appends an item, evicting the oldest one when full.
    pub async fn add(&self, item: T) {
        if self.capacity == 0 {
            return;
        }
        let mut items = self.items.write().await;
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    /// Returns every stored item, oldest first.
    pub async fn get_all(&self) -> Vec<T> {
        self.items.read().await.iter().cloned().collect()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Maximum number of stored items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The state-change event history.
pub type EventLog = RingBuffer<Event>;

impl RingBuffer<Event> {
    /// Events observed after `cutoff`, oldest first.
    pub async fn since(&self, cutoff: DateTime<Utc>) -> Vec<Event> {
        self.items.read().await.iter().filter(|event| event.timestamp > cutoff).cloned().collect()
    }
}
