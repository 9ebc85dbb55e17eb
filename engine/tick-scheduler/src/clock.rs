//! Time sources used by the TickScheduler

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::probe;

/// Reference point that elapsed time is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Monotonic reading, as an offset from the clock's own origin
    Monotonic(Duration),
    /// Wall-clock reading in milliseconds since the Unix epoch
    Wall(u64),
}

/// A source of wall-clock and monotonic time
pub trait Clock: Send + Sync + 'static {
    /// Wall-clock time in milliseconds since the Unix epoch
    fn wall_ms(&self) -> u64;

    /// Monotonic time since this clock's origin, or `None` if it cannot be read
    fn monotonic(&self) -> Option<Duration>;

    /// Whether monotonic readings should be preferred over the wall clock
    fn high_resolution(&self) -> bool;

    /// Capture a reference mark from the monotonic source when `monotonic` is set, otherwise
    /// from the wall clock.
    fn mark(&self, monotonic: bool) -> Option<Mark> {
        if monotonic {
            self.monotonic().map(Mark::Monotonic)
        } else {
            Some(Mark::Wall(self.wall_ms()))
        }
    }

    /// Milliseconds elapsed since `mark`, rounded up for monotonic readings.
    fn elapsed_ms(&self, mark: Mark) -> Option<u64> {
        match mark {
            Mark::Monotonic(at) => {
                let now = self.monotonic()?;
                Some(ceil_millis(now.saturating_sub(at)))
            }
            Mark::Wall(at) => Some(self.wall_ms().saturating_sub(at)),
        }
    }
}

fn ceil_millis(duration: Duration) -> u64 {
    let nanos = duration.as_nanos();
    let millis = nanos.div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// The host clock: `chrono` for wall time, tokio's `Instant` for monotonic time
///
/// Monotonic readings go through `tokio::time::Instant`, so they follow a paused test runtime.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    high_resolution: bool,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now(), high_resolution: probe::high_resolution_available() }
    }

    /// Force the wall-clock strategy even where a monotonic clock exists
    pub fn wall_only() -> Self {
        Self { origin: Instant::now(), high_resolution: false }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }

    fn monotonic(&self) -> Option<Duration> {
        if !self.high_resolution {
            return None;
        }
        Some(Instant::now().saturating_duration_since(self.origin))
    }

    fn high_resolution(&self) -> bool {
        self.high_resolution
    }
}

#[derive(Debug)]
struct ManualState {
    wall_ms: u64,
    monotonic: Duration,
    monotonic_available: bool,
}

/// A clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and give another to a scheduler.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
    high_resolution: bool,
}

impl ManualClock {
    /// Create a clock reading `wall_ms` that prefers monotonic readings
    pub fn new(wall_ms: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                wall_ms,
                monotonic: Duration::ZERO,
                monotonic_available: true,
            })),
            high_resolution: true,
        }
    }

    /// Create a clock reading `wall_ms` that only offers wall-clock time
    pub fn wall_only(wall_ms: u64) -> Self {
        Self { high_resolution: false, ..Self::new(wall_ms) }
    }

    /// Move both wall and monotonic time forward
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.wall_ms = state.wall_ms.saturating_add(ceil_millis(by));
        state.monotonic = state.monotonic.saturating_add(by);
    }

    /// Set the wall clock without touching monotonic time
    pub fn set_wall_ms(&self, wall_ms: u64) {
        self.state.lock().wall_ms = wall_ms;
    }

    /// Make monotonic readings fail (or succeed again)
    pub fn set_monotonic_available(&self, available: bool) {
        self.state.lock().monotonic_available = available;
    }
}

impl Clock for ManualClock {
    fn wall_ms(&self) -> u64 {
        self.state.lock().wall_ms
    }

    fn monotonic(&self) -> Option<Duration> {
        let state = self.state.lock();
        state.monotonic_available.then_some(state.monotonic)
    }

    fn high_resolution(&self) -> bool {
        self.high_resolution
    }
}
