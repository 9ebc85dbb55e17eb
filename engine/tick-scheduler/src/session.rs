//! Run session bookkeeping

use serde::{Deserialize, Serialize};

use crate::clock::Mark;

/// Time information for the latest run of a timer, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSnapshot {
    /// Wall-clock start time (`0` if never started)
    pub started: u64,
    /// Wall-clock stop time (`0` while running or if never stopped)
    pub stopped: u64,
    /// Milliseconds between start and now, or between start and stop once stopped
    pub elapsed: u64,
}

/// Bookkeeping for one continuous active period
#[derive(Debug, Clone, Default)]
pub(crate) struct RunSession {
    pub started_at: Option<u64>,
    pub stopped_at: Option<u64>,
    pub tick_count: u64,
    /// Ticks since the latest start or resume; the drift policy compares against this
    pub ticks_since_resume: u64,
    pub resume_mark: Option<Mark>,
}

impl RunSession {
    /// Begin a fresh session at `now`
    pub fn begin(&mut self, now: u64, mark: Option<Mark>) {
        *self = Self { started_at: Some(now), resume_mark: mark, ..Self::default() };
    }

    /// Re-establish the drift reference after a pause
    pub fn resume(&mut self, mark: Option<Mark>) {
        self.resume_mark = mark;
        self.ticks_since_resume = 0;
    }

    pub fn record_tick(&mut self) -> u64 {
        self.tick_count += 1;
        self.ticks_since_resume += 1;
        self.tick_count
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Derive the time snapshot; `frozen` selects the stop time over `now` as the end point.
    pub fn snapshot(&self, now: u64, frozen: bool) -> TimeSnapshot {
        let Some(started) = self.started_at else {
            return TimeSnapshot::default();
        };
        let stopped = self.stopped_at.unwrap_or(0);
        let end = if frozen { stopped } else { now };
        TimeSnapshot { started, stopped, elapsed: end.saturating_sub(started) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_snapshot_before_start() {
        let session = RunSession::default();
        assert_eq!(session.snapshot(5_000, false), TimeSnapshot::default());
        assert_eq!(session.snapshot(5_000, true), TimeSnapshot::default());
    }

    #[test]
    fn test_snapshot_running_and_frozen() {
        let mut session = RunSession::default();
        session.begin(1_000, Some(Mark::Wall(1_000)));
        assert_eq!(
            session.snapshot(1_750, false),
            TimeSnapshot { started: 1_000, stopped: 0, elapsed: 750 }
        );

        session.stopped_at = Some(6_432);
        assert_eq!(
            session.snapshot(9_999, true),
            TimeSnapshot { started: 1_000, stopped: 6_432, elapsed: 5_432 }
        );
    }

    #[test]
    fn test_begin_resets_counters() {
        let mut session = RunSession::default();
        session.begin(0, None);
        session.record_tick();
        session.record_tick();
        session.stopped_at = Some(10);

        session.begin(20, Some(Mark::Monotonic(Duration::from_millis(20))));
        assert_eq!(session.tick_count, 0);
        assert_eq!(session.ticks_since_resume, 0);
        assert_eq!(session.stopped_at, None);
        assert_eq!(session.started_at, Some(20));
    }

    #[test]
    fn test_resume_keeps_tick_count() {
        let mut session = RunSession::default();
        session.begin(0, Some(Mark::Wall(0)));
        assert_eq!(session.record_tick(), 1);
        assert_eq!(session.record_tick(), 2);

        session.resume(Some(Mark::Wall(500)));
        assert_eq!(session.tick_count, 2);
        assert_eq!(session.ticks_since_resume, 0);
        assert_eq!(session.record_tick(), 3);
        assert_eq!(session.ticks_since_resume, 1);
    }
}
