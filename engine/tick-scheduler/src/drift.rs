//! Drift correction policy
//!
//! Given the time elapsed since the session reference mark, decide how long to wait before the
//! next tick. The target is always the next ideal boundary `mark + (ticks + 1) * interval`, not
//! `now + interval`, so lateness in one wake-up is absorbed by a shorter wait for the next.

use std::time::Duration;

/// How the next wake-up should be armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeUp {
    /// Behind by at least one full interval: run as soon as possible
    Immediate,
    /// Wait this long before the next tick
    Delayed(Duration),
}

/// Drift-corrected wake-up for a scheduler that has delivered `ticks` ticks over
/// `elapsed_ms` milliseconds.
///
/// Being exactly on a boundary (`elapsed_ms / interval_ms == ticks`) is not "behind": it waits a
/// full interval for the following boundary.
pub fn next_wake(elapsed_ms: u64, interval_ms: u64, ticks: u64) -> WakeUp {
    let interval_ms = interval_ms.max(1);
    let expected = elapsed_ms / interval_ms;
    if expected > ticks {
        return WakeUp::Immediate;
    }
    WakeUp::Delayed(Duration::from_millis(interval_ms - elapsed_ms % interval_ms))
}

/// Uncorrected wake-up used when precision is off
pub fn fixed_wake(interval_ms: u64) -> WakeUp {
    WakeUp::Delayed(Duration::from_millis(interval_ms.max(1)))
}

/// Milliseconds by which the latest tick missed its ideal boundary
pub fn lateness_ms(elapsed_ms: u64, interval_ms: u64, ticks: u64) -> u64 {
    elapsed_ms.saturating_sub(ticks.saturating_mul(interval_ms))
}
