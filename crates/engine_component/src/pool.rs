//! Indexed pools with O(1) append and O(1) unordered removal.
//!
//! A [`Pool`] is a dense vector with a capacity hint fixed at construction.
//! Removal moves the last element into the vacated slot, so callers that
//! record slot indices must re-read the element now sitting at the removed
//! index and update its recorded slot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a pool does when a push would exceed its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Double the capacity and accept the push.
    #[default]
    Grow,
    /// Refuse the push with [`PoolError::Full`].
    Reject,
}

/// Errors produced by [`Pool`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool is full (capacity {capacity})")]
    Full { capacity: usize },
}

/// A dense, index-addressed container.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    items: Vec<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> Pool<T> {
    /// Creates an empty pool that holds `capacity` items before the overflow
    /// policy applies.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Appends an item and returns its slot index.
    pub fn push(&mut self, item: T) -> Result<usize, PoolError> {
        if self.items.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::Grow => {
                    self.capacity = (self.capacity * 2).max(1);
                    self.items.reserve(self.capacity - self.items.len());
                }
                OverflowPolicy::Reject => {
                    return Err(PoolError::Full {
                        capacity: self.capacity,
                    });
                }
            }
        }
        let index = self.items.len();
        self.items.push(item);
        Ok(index)
    }

    /// Removes the item at `index` by swapping the last item into its place.
    ///
    /// After a successful call, `self.get(index)` (if any) is the item that
    /// used to be last.
    pub fn fast_remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.swap_remove(index))
    }

    /// Entry at `index`, if within the pool.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current capacity. Under [`OverflowPolicy::Grow`] this can exceed the
    /// value passed to [`Pool::new`].
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// What happens when a push exceeds capacity.
    #[must_use]
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of pushes accepted before the overflow policy applies.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    /// Returns `true` if `n` more items would be accepted.
    #[must_use]
    pub fn has_room_for(&self, n: usize) -> bool {
        self.policy == OverflowPolicy::Grow || self.remaining() >= n
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Entries in insertion order, as moved by swap-removal.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drops the first `n` items, keeping the rest in order.
    pub fn discard_front(&mut self, n: usize) {
        let n = n.min(self.items.len());
        self.items.drain(..n);
    }

    /// Empties the pool without releasing its allocation.
    pub fn reset(&mut self) {
        self.items.clear();
    }
}

impl<'a, T> IntoIterator for &'a Pool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
