//! # TickScheduler
//!
//! A self-correcting repeating-tick scheduler.
//!
//! Every wake-up measures the time elapsed since the session reference mark and derives the
//! remaining time to the next ideal tick boundary, so the long-run cadence stays locked to the
//! clock even though every individual host timer fires a little late. When the scheduler falls
//! a full interval behind it re-arms immediately until it has caught up.
//!
//! ```no_run
//! use tick_scheduler::{EventKind, TickScheduler};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tick_scheduler::TimerError> {
//! let timer = TickScheduler::with_interval(250);
//! timer.on(EventKind::Tick, |event| {
//!     println!("tick {}", event.timer.tick_count());
//!     Ok(())
//! });
//! timer.start()?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod drift;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod work;


#[cfg(test)]
mod integration_tests;

pub use clock::{Clock, ManualClock, Mark, SystemClock};
pub use config::{normalize_bool, normalize_interval, TimerConfig};
pub use drift::WakeUp;
pub use error::{HaltReason, HandlerError, TimerError};
pub use metrics::TickMetrics;
pub use notifier::{EventKind, ListenerId, Notifier};
pub use scheduler::{SchedulerBuilder, TickScheduler, TimerEvent, TimerState};
pub use session::TimeSnapshot;
pub use work::PendingWake;

/// Current version of the TickScheduler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tick interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Smallest interval the scheduler accepts, in milliseconds
pub const MIN_INTERVAL_MS: u64 = 1;

/// Drift correction is on unless configured otherwise
pub const DEFAULT_PRECISION: bool = true;

/// Number of lateness samples kept for percentile reporting
pub const DEFAULT_METRICS_HISTORY: usize = 1000;
