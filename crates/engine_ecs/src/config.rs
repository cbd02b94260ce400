//! World configuration.

use engine_component::OverflowPolicy;
use serde::Deserialize;

/// What a flush does when a lifecycle callback returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackErrorPolicy {
    /// Log the error, count it in the frame stats and keep flushing.
    #[default]
    SkipAndContinue,
    /// Finish the current object, then stop the flush. Unprocessed queue
    /// entries carry over to the next frame.
    AbortFlush,
}

/// Construction parameters for a [`World`](crate::World).
///
/// Every field has a default, so `{}` is a valid JSON configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Initial capacity of the live registry and of each deferred queue.
    pub pool_size: usize,
    /// Overflow behaviour of the deferred queues. The live registry always
    /// grows.
    pub overflow: OverflowPolicy,
    pub callback_errors: CallbackErrorPolicy,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pool_size: 100,
            overflow: OverflowPolicy::Grow,
            callback_errors: CallbackErrorPolicy::SkipAndContinue,
        }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    #[must_use]
    pub fn with_callback_errors(mut self, policy: CallbackErrorPolicy) -> Self {
        self.callback_errors = policy;
        self
    }
}
