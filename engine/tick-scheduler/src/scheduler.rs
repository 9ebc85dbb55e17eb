//! Core TickScheduler implementation

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::config::{clamp_interval, TimerConfig};
use crate::drift::{self, WakeUp};
use crate::error::{HaltReason, HandlerError, TimerError};
use crate::metrics::{MetricsCollector, TickMetrics};
use crate::notifier::{EventKind, ListenerId, Notifier};
use crate::session::{RunSession, TimeSnapshot};
use crate::work::{PendingWake, ScheduledWork};
use crate::DEFAULT_METRICS_HISTORY;

/// Lifecycle state of a TickScheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Initial state, and the state after `reset`
    #[default]
    Idle,
    /// Ticking
    Running,
    /// Suspended by `pause`; `resume` continues the session
    Paused,
    /// Frozen by `stop`
    Stopped,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Payload delivered to every handler
#[derive(Clone)]
pub struct TimerEvent {
    pub name: EventKind,
    pub timer: TickScheduler,
}

impl fmt::Debug for TimerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEvent").field("name", &self.name).field("timer", &self.timer).finish()
    }
}

#[derive(Debug, Default)]
struct Core {
    config: TimerConfig,
    state: TimerState,
    session: RunSession,
    work: ScheduledWork,
    generation: u64,
    run_count: u64,
    halted: Option<HaltReason>,
}

struct Shared {
    // Held across every state change and its notification, so all of them form one
    // serial stream. Reentrant so handlers can call back into the scheduler.
    core: ReentrantMutex<RefCell<Core>>,
    notifier: Notifier<TimerEvent>,
    clock: Arc<dyn Clock>,
    high_resolution: bool,
    runtime: Option<Handle>,
    metrics: MetricsCollector,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.core.get_mut().get_mut().work.cancel();
    }
}

/// Builder for a TickScheduler with a custom clock or runtime
pub struct SchedulerBuilder {
    config: TimerConfig,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: TimerConfig) -> Self {
        self.config = config.normalized();
        self
    }

    pub fn interval(mut self, interval_ms: i64) -> Self {
        self.config.interval_ms = clamp_interval(interval_ms);
        self
    }

    pub fn precision(mut self, precision: bool) -> Self {
        self.config.precision = precision;
        self
    }

    /// Measure time with `clock` instead of the system clock
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Host wake-ups on `handle` instead of the runtime current at build time
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> TickScheduler {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let high_resolution = clock.high_resolution();
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());

        tracing::debug!(
            interval_ms = self.config.interval_ms,
            precision = self.config.precision,
            high_resolution,
            "Creating TickScheduler"
        );

        TickScheduler {
            inner: Arc::new(Shared {
                core: ReentrantMutex::new(RefCell::new(Core {
                    config: self.config,
                    ..Core::default()
                })),
                notifier: Notifier::new(),
                clock,
                high_resolution,
                runtime,
                metrics: MetricsCollector::new(DEFAULT_METRICS_HISTORY),
            }),
        }
    }
}

/// A self-correcting repeating-tick scheduler
///
/// Cloning yields another handle to the same scheduler. Wake-ups only hold a weak reference:
/// once every handle is dropped, pending work is canceled.
///
/// Handlers receive a handle in [`TimerEvent::timer`]; capturing a clone of the scheduler in
/// one of its own handlers creates a reference cycle that keeps it alive.
#[derive(Clone)]
pub struct TickScheduler {
    inner: Arc<Shared>,
}

impl fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.core.lock();
        let core = guard.borrow();
        f.debug_struct("TickScheduler")
            .field("state", &core.state)
            .field("interval_ms", &core.config.interval_ms)
            .field("precision", &core.config.precision)
            .field("tick_count", &core.session.tick_count)
            .finish()
    }
}

impl TickScheduler {
    /// Create a scheduler using the system clock
    pub fn new(config: TimerConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a scheduler from a bare interval, clamped to at least 1ms
    pub fn with_interval(interval_ms: i64) -> Self {
        Self::builder().interval(interval_ms).build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder { config: TimerConfig::default(), clock: None, runtime: None }
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Begin a fresh session, restarting if one is already running.
    ///
    /// Only a failing `start` handler produces an error, and only after the scheduler is
    /// running and armed.
    pub fn start(&self) -> Result<&Self, TimerError> {
        let guard = self.inner.core.lock();
        let run = {
            let mut core = guard.borrow_mut();
            core.work.cancel();
            let mark = self.inner.clock.mark(self.inner.high_resolution);
            let now = self.inner.clock.wall_ms();
            core.session.begin(now, mark);
            core.state = TimerState::Running;
            core.run_count += 1;
            core.halted = None;
            core.run_count
        };
        self.inner.metrics.reset();

        tracing::info!("TickScheduler started (interval {}ms)", self.interval());
        let notified = self.emit(EventKind::Start);
        self.arm_for_run(run);
        notified.map(|_| self)
    }

    /// Stop a running scheduler; a no-op in any other state.
    pub fn stop(&self) -> Result<&Self, TimerError> {
        let guard = self.inner.core.lock();
        {
            let mut core = guard.borrow_mut();
            if core.state != TimerState::Running {
                return Ok(self);
            }
            core.work.cancel();
            core.session.stopped_at = Some(self.inner.clock.wall_ms());
            core.state = TimerState::Stopped;
            tracing::info!("TickScheduler stopped after {} ticks", core.session.tick_count);
        }
        self.emit(EventKind::Stop)?;
        Ok(self)
    }

    /// Suspend a running scheduler, keeping its tick count; a no-op in any other state.
    pub fn pause(&self) -> Result<&Self, TimerError> {
        let guard = self.inner.core.lock();
        {
            let mut core = guard.borrow_mut();
            if core.state != TimerState::Running {
                return Ok(self);
            }
            core.work.cancel();
            core.session.ticks_since_resume = 0;
            core.state = TimerState::Paused;
            tracing::info!("TickScheduler paused at tick {}", core.session.tick_count);
        }
        self.emit(EventKind::Pause)?;
        Ok(self)
    }

    /// Continue a paused session with a fresh drift reference. An idle scheduler is started;
    /// running or stopped schedulers are left alone.
    pub fn resume(&self) -> Result<&Self, TimerError> {
        let guard = self.inner.core.lock();
        let run = {
            let mut core = guard.borrow_mut();
            let state = core.state;
            match state {
                TimerState::Paused => {}
                TimerState::Idle => {
                    drop(core);
                    return self.start();
                }
                TimerState::Running | TimerState::Stopped => return Ok(self),
            }
            let mark = self.inner.clock.mark(self.inner.high_resolution);
            core.session.resume(mark);
            core.state = TimerState::Running;
            core.run_count += 1;
            core.halted = None;
            tracing::info!("TickScheduler resumed at tick {}", core.session.tick_count);
            core.run_count
        };
        let notified = self.emit(EventKind::Resume);
        self.arm_for_run(run);
        notified.map(|_| self)
    }

    /// Return to `Idle` from any state, clearing the session.
    pub fn reset(&self) -> Result<&Self, TimerError> {
        let guard = self.inner.core.lock();
        {
            let mut core = guard.borrow_mut();
            core.work.cancel();
            core.session.clear();
            core.state = TimerState::Idle;
            core.halted = None;
        }
        self.inner.metrics.reset();

        tracing::info!("TickScheduler reset");
        self.emit(EventKind::Reset)?;
        Ok(self)
    }

    /// Run `callback` once, one interval from now, regardless of the scheduler's state.
    ///
    /// The callback does not count as a tick. Abort the returned handle to cancel it.
    pub fn next_tick<F>(&self, callback: F) -> Result<JoinHandle<()>, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self.runtime().ok_or(TimerError::NoRuntime)?;
        let deadline = Instant::now() + self.config().interval();
        Ok(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        }))
    }

    // ---------------------------
    // Subscription
    // ---------------------------

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&TimerEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.notifier.on(kind, handler)
    }

    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&TimerEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.inner.notifier.once(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.notifier.off(id)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.notifier.listener_count(kind)
    }

    // ---------------------------
    // Accessors
    // ---------------------------

    pub fn interval(&self) -> u64 {
        self.read(|core| core.config.interval_ms)
    }

    /// Takes effect from the next scheduling decision. Values below 1ms are clamped.
    pub fn set_interval(&self, interval_ms: i64) {
        self.write(|core| core.config.interval_ms = clamp_interval(interval_ms));
    }

    pub fn precision(&self) -> bool {
        self.read(|core| core.config.precision)
    }

    pub fn set_precision(&self, precision: bool) {
        self.write(|core| core.config.precision = precision);
    }

    pub fn config(&self) -> TimerConfig {
        self.read(|core| core.config)
    }

    pub fn set_config(&self, config: TimerConfig) {
        self.write(|core| core.config = config.normalized());
    }

    pub fn state(&self) -> TimerState {
        self.read(|core| core.state)
    }

    /// Ticks delivered in the current or most recent session
    pub fn tick_count(&self) -> u64 {
        self.read(|core| core.session.tick_count)
    }

    /// Number of times the scheduler entered `Running` through `start` or `resume`
    pub fn run_count(&self) -> u64 {
        self.read(|core| core.run_count)
    }

    pub fn time(&self) -> TimeSnapshot {
        let now = self.inner.clock.wall_ms();
        self.read(|core| core.session.snapshot(now, core.state == TimerState::Stopped))
    }

    /// Why scheduling halted while `Running`, if it did
    pub fn halted(&self) -> Option<HaltReason> {
        self.read(|core| core.halted)
    }

    pub fn pending_wake(&self) -> PendingWake {
        self.read(|core| core.work.kind())
    }

    pub fn metrics(&self) -> TickMetrics {
        self.inner.metrics.get_metrics()
    }

    // ---------------------------
    // Scheduling
    // ---------------------------

    fn read<R>(&self, f: impl FnOnce(&Core) -> R) -> R {
        let guard = self.inner.core.lock();
        let core = guard.borrow();
        f(&core)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Core) -> R) -> R {
        let guard = self.inner.core.lock();
        let mut core = guard.borrow_mut();
        f(&mut core)
    }

    fn runtime(&self) -> Option<Handle> {
        self.inner.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    fn emit(&self, kind: EventKind) -> Result<(), TimerError> {
        let event = TimerEvent { name: kind, timer: self.clone() };
        self.inner.notifier.emit(kind, &event).map(|_| ())
    }

    /// Arm the next wake-up unless a handler already moved the scheduler on from `run`.
    fn arm_for_run(&self, run: u64) {
        let guard = self.inner.core.lock();
        let mut core = guard.borrow_mut();
        if core.state != TimerState::Running
            || core.run_count != run
            || core.work.is_pending()
            || core.halted.is_some()
        {
            return;
        }
        self.arm(&mut core);
    }

    fn arm(&self, core: &mut Core) {
        let interval_ms = core.config.interval_ms;
        let wake = if core.config.precision {
            let Some(mark) = core.session.resume_mark else {
                return Self::halt(core, HaltReason::MissingReferenceMark);
            };
            let Some(elapsed) = self.inner.clock.elapsed_ms(mark) else {
                return Self::halt(core, HaltReason::ClockUnavailable);
            };
            drift::next_wake(elapsed, interval_ms, core.session.ticks_since_resume)
        } else {
            drift::fixed_wake(interval_ms)
        };

        let Some(runtime) = self.runtime() else {
            return Self::halt(core, HaltReason::NoRuntime);
        };

        core.generation += 1;
        let generation = core.generation;
        let weak = Arc::downgrade(&self.inner);
        core.work = match wake {
            WakeUp::Immediate => {
                let task = runtime.spawn(async move { Self::fire(weak, generation) });
                ScheduledWork::Immediate { generation, handle: task.abort_handle() }
            }
            WakeUp::Delayed(delay) => {
                // the deadline counts from arming, not from the task's first poll
                let deadline = Instant::now() + delay;
                let task = runtime.spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    Self::fire(weak, generation);
                });
                ScheduledWork::Delayed { generation, handle: task.abort_handle() }
            }
        };

        self.inner.metrics.record_wake(wake == WakeUp::Immediate);
        tracing::trace!(?wake, tick = core.session.tick_count, "Armed next wake-up");
    }

    fn halt(core: &mut Core, reason: HaltReason) {
        tracing::warn!("Tick scheduling halted: {}", reason);
        core.halted = Some(reason);
    }

    fn fire(weak: Weak<Shared>, generation: u64) {
        if let Some(inner) = weak.upgrade() {
            TickScheduler { inner }.tick(generation);
        }
    }

    fn tick(&self, generation: u64) {
        let guard = self.inner.core.lock();
        let (run, tick) = {
            let mut core = guard.borrow_mut();
            if core.state != TimerState::Running || !core.work.take_if(generation) {
                return;
            }
            let tick = core.session.record_tick();
            let elapsed = core.session.resume_mark.and_then(|mark| self.inner.clock.elapsed_ms(mark));
            if let Some(elapsed) = elapsed {
                let ticks = core.session.ticks_since_resume;
                self.inner.metrics.record_tick(drift::lateness_ms(
                    elapsed,
                    core.config.interval_ms,
                    ticks,
                ));
            }
            (core.run_count, tick)
        };

        if let Err(error) = self.emit(EventKind::Tick) {
            tracing::error!("Tick {} handler failed: {}", tick, error);
        }
        self.arm_for_run(run);
    }
}
