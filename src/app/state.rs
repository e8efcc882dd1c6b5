//! Application state management.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::LedgerStore;

use super::service::LedgerService;

/// Default number of attempts for a request that hits write conflicts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default time a request may spend retrying
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(10);

/// Default request body limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Bounds for retrying a request whose unit of work lost a write conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included. At least 1.
    pub max_attempts: u32,
    /// Measured from request arrival; checked before every retry
    pub deadline: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, deadline: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            deadline,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_DEADLINE)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub store: Arc<dyn LedgerStore>,
    pub retry_policy: RetryPolicy,
    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,
}

impl AppState {
    /// Create a new application state with the default retry policy
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        let service = Arc::new(LedgerService::new(Arc::clone(&store)));
        Self {
            service,
            store,
            retry_policy: RetryPolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Replace the retry policy (builder pattern)
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Replace the request body limit (builder pattern)
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}
