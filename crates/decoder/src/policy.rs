//! Process-wide caching policy.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use gp_common::CachingStrategy;

/// Read-mostly holder of the current [`CachingStrategy`].
///
/// Changes apply to loads issued afterwards; sessions that are already
/// loaded keep the strategy they were created with.
#[derive(Debug)]
pub struct CachingPolicy {
    code: AtomicU8,
}

impl CachingPolicy {
    pub fn new(strategy: CachingStrategy) -> Self {
        Self {
            code: AtomicU8::new(strategy.code()),
        }
    }

    pub fn get(&self) -> CachingStrategy {
        CachingStrategy::from_code(self.code.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn set(&self, strategy: CachingStrategy) {
        let previous = self.code.swap(strategy.code(), Ordering::AcqRel);
        if previous != strategy.code() {
            debug!(?strategy, "Caching strategy changed");
        }
    }
}

impl Default for CachingPolicy {
    fn default() -> Self {
        Self::new(CachingStrategy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_disabled() {
        assert_eq!(CachingPolicy::default().get(), CachingStrategy::Disabled);
    }

    #[test]
    fn set_and_get() {
        let policy = CachingPolicy::new(CachingStrategy::WhenDecoded);
        assert_eq!(policy.get(), CachingStrategy::WhenDecoded);
        policy.set(CachingStrategy::PreCache);
        assert_eq!(policy.get(), CachingStrategy::PreCache);
    }
}
