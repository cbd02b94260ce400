//! Monotonic handle allocation shared by entities and components.

use std::marker::PhantomData;

/// A copyable wrapper around a raw `u64` id.
pub trait Handle: Copy {
    fn from_raw_id(id: u64) -> Self;
}

/// Hands out ids `1, 2, 3, ...` and never reuses one, so a stale handle can
/// never alias a newer object. Id 0 is left free as the invalid sentinel.
#[derive(Debug)]
pub struct IdAllocator<H> {
    next: u64,
    _handle: PhantomData<fn() -> H>,
}

impl<H: Handle> IdAllocator<H> {
    /// Starts allocating at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 1,
            _handle: PhantomData,
        }
    }

    /// Returns the next unused handle.
    pub fn allocate(&mut self) -> H {
        let id = self.next;
        self.next += 1;
        H::from_raw_id(id)
    }

    /// Number of handles allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next - 1
    }
}

impl<H: Handle> Default for IdAllocator<H> {
    fn default() -> Self {
        Self::new()
    }
}
