//! Session id allocator.
//!
//! One instance per process, shared by `Arc` between every session manager
//! handle. Ids are handed out in increasing order and wrap to 0 once the
//! counter reaches `i32::MAX`.

use std::sync::atomic::{AtomicI32, Ordering};

use gp_common::SessionId;

/// Issues unique, monotonically increasing [`SessionId`]s.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicI32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Allocator whose first id is `first` (clamped to be non-negative).
    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first.max(0)),
        }
    }

    /// Return the current counter value and advance it.
    pub fn generate_id(&self) -> SessionId {
        let previous = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(if current == i32::MAX { 0 } else { current + 1 })
            })
            // The closure always returns Some.
            .unwrap_or_else(|current| current);
        SessionId::new(previous)
    }

    /// Value the next call to [`generate_id`](Self::generate_id) will return.
    pub fn peek(&self) -> SessionId {
        SessionId::new(self.next.load(Ordering::Acquire))
    }

    /// Move the counter back to `next`, as if a full wrap had happened.
    #[cfg(test)]
    pub(crate) fn rewind_to(&self, next: SessionId) {
        self.next.store(next.raw().max(0), Ordering::Release);
    }
}
