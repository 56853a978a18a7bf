//! Wall-clock deadline helpers shared by the invocation layer.

use std::time::{Duration, Instant};

/// Time left until `deadline`, or `None` once it has passed.
pub fn remaining_budget(deadline: Instant) -> Option<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return None;
    }
    Some(remaining)
}

/// Poll wait bounded by both the poll interval and the remaining budget.
pub fn next_poll_wait(deadline: Instant, poll_interval: Duration) -> Option<Duration> {
    remaining_budget(deadline).map(|left| left.min(poll_interval))
}

/// Deadline for collecting output once the child is gone: the invocation
/// deadline, but never less than `grace` from now.
pub fn drain_deadline(deadline: Instant, grace: Duration) -> Instant {
    deadline.max(Instant::now() + grace)
}
