//! ---
//! hil_section: "01-core-functionality"
//! hil_subsection: "module"
//! hil_type: "source"
//! hil_scope: "code"
//! hil_description: "Shared primitives and utilities for the HIL harness."
//! hil_version: "v0.1.0"
//! hil_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

/// Monotonic deadline `timeout` from now, saturating far in the future.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}

/// Time left until `deadline`, zero once it has passed.
pub fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Sleep for `step`, never past `deadline`.
pub fn sleep_until_or(deadline: Instant, step: Duration) {
    let left = remaining(deadline);
    if !left.is_zero() {
        std::thread::sleep(step.min(left));
    }
}
