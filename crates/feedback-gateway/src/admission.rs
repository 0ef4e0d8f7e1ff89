//! Per-client admission control.
//!
//! Each budget is a fixed window per client key: the window opens on the
//! key's first request and the count resets once the window has elapsed.
//! Time comes from a `governor` clock so tests can drive it by hand.

use std::time::Duration;

use dashmap::DashMap;
use feedback_core::config::{LimitsConfig, RateLimitConfig};
use governor::clock::{Clock, DefaultClock, Reference};

/// One request budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// Message returned to throttled clients.
    pub message: String,
}

impl From<&RateLimitConfig> for WindowPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window(),
            message: config.message.clone(),
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The request fits in the current window.
    Admitted {
        /// Requests left in the window after this one.
        remaining: u32,
    },
    /// The budget for the current window is spent.
    Rejected {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

/// An admitted request, with the budget state to report back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    /// Requests allowed per window.
    pub limit: u32,
    /// Requests left in the window.
    pub remaining: u32,
}

/// A request rejected for exceeding its budget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Throttled {
    /// Fixed human-readable message of the policy.
    pub message: String,
    /// Time until the window resets.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct WindowState<I> {
    started: I,
    count: u32,
}

/// Keyed fixed-window counter.
pub struct FixedWindowLimiter<C: Clock = DefaultClock> {
    policy: WindowPolicy,
    clock: C,
    windows: DashMap<String, WindowState<C::Instant>>,
}

impl FixedWindowLimiter<DefaultClock> {
    /// Create a limiter on the default monotonic clock.
    #[must_use]
    pub fn new(policy: WindowPolicy) -> Self {
        Self::with_clock(policy, DefaultClock::default())
    }
}

impl<C: Clock> FixedWindowLimiter<C> {
    /// Create a limiter on the given clock.
    #[must_use]
    pub fn with_clock(policy: WindowPolicy, clock: C) -> Self {
        Self {
            policy,
            clock,
            windows: DashMap::new(),
        }
    }

    /// The policy this limiter enforces.
    #[must_use]
    pub const fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    /// Count a request from `key` against its window.
    ///
    /// Rejected requests do not consume budget.
    pub fn check(&self, key: &str) -> AdmissionDecision {
        let now = self.clock.now();
        let mut state = self
            .windows
            .entry(key.to_owned())
            .or_insert_with(|| WindowState {
                started: now,
                count: 0,
            });

        let elapsed = Duration::from(now.duration_since(state.started));
        if elapsed >= self.policy.window {
            state.started = now;
            state.count = 0;
        }

        if state.count < self.policy.max_requests {
            state.count += 1;
            AdmissionDecision::Admitted {
                remaining: self.policy.max_requests - state.count,
            }
        } else {
            AdmissionDecision::Rejected {
                retry_after: self.policy.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop clients whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, state| Duration::from(now.duration_since(state.started)) < self.policy.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a tracked window.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn admit(&self, key: &str) -> Result<Admitted, Throttled> {
        match self.check(key) {
            AdmissionDecision::Admitted { remaining } => Ok(Admitted {
                limit: self.policy.max_requests,
                remaining,
            }),
            AdmissionDecision::Rejected { retry_after } => Err(Throttled {
                message: self.policy.message.clone(),
                retry_after,
            }),
        }
    }
}

/// Admission decisions for the write and read paths.
pub trait AdmissionControl: Send + Sync {
    /// Admit a mutating request from `client_key`.
    ///
    /// # Errors
    ///
    /// Returns `Throttled` if the client's write budget is spent.
    fn admit_write(&self, client_key: &str) -> Result<Admitted, Throttled>;

    /// Admit a read-only request from `client_key`.
    ///
    /// # Errors
    ///
    /// Returns `Throttled` if the client's read budget is spent.
    fn admit_read(&self, client_key: &str) -> Result<Admitted, Throttled>;

    /// Forget clients whose windows have elapsed.
    fn purge_expired(&self) -> usize;
}

/// Admission filter with independent write and read budgets.
pub struct AdmissionFilter<C: Clock = DefaultClock> {
    write: FixedWindowLimiter<C>,
    read: FixedWindowLimiter<C>,
}

impl AdmissionFilter<DefaultClock> {
    /// Create a filter on the default monotonic clock.
    #[must_use]
    pub fn new(write: WindowPolicy, read: WindowPolicy) -> Self {
        Self::with_clock(write, read, DefaultClock::default())
    }

    /// Create a filter from the configured limits.
    #[must_use]
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new((&limits.write).into(), (&limits.read).into())
    }
}

impl<C: Clock + Clone> AdmissionFilter<C> {
    /// Create a filter whose limiters share `clock`.
    #[must_use]
    pub fn with_clock(write: WindowPolicy, read: WindowPolicy, clock: C) -> Self {
        Self {
            write: FixedWindowLimiter::with_clock(write, clock.clone()),
            read: FixedWindowLimiter::with_clock(read, clock),
        }
    }

    /// The write-path limiter.
    #[must_use]
    pub const fn write_limiter(&self) -> &FixedWindowLimiter<C> {
        &self.write
    }

    /// The read-path limiter.
    #[must_use]
    pub const fn read_limiter(&self) -> &FixedWindowLimiter<C> {
        &self.read
    }
}

impl<C> AdmissionControl for AdmissionFilter<C>
where
    C: Clock + Send + Sync,
{
    fn admit_write(&self, client_key: &str) -> Result<Admitted, Throttled> {
        self.write
            .admit(client_key)
            .inspect(|a| {
                tracing::debug!(client = client_key, remaining = a.remaining, "Write request admitted");
            })
            .inspect_err(|t| {
                tracing::warn!(client = client_key, retry_after = ?t.retry_after, "Write request throttled");
            })
    }

    fn admit_read(&self, client_key: &str) -> Result<Admitted, Throttled> {
        self.read
            .admit(client_key)
            .inspect(|a| {
                tracing::debug!(client = client_key, remaining = a.remaining, "Read request admitted");
            })
            .inspect_err(|t| {
                tracing::warn!(client = client_key, retry_after = ?t.retry_after, "Read request throttled");
            })
    }

    fn purge_expired(&self) -> usize {
        self.write.purge_expired() + self.read.purge_expired()
    }
}

impl<C: Clock> std::fmt::Debug for AdmissionFilter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionFilter")
            .field("write", &self.write.policy)
            .field("read", &self.read.policy)
            .field("tracked_write_clients", &self.write.tracked_clients())
            .field("tracked_read_clients", &self.read.tracked_clients())
            .finish()
    }
}
