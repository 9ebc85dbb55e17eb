//! Metrics collection for TickScheduler

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Drift metrics for the current session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickMetrics {
    /// Ticks recorded since the collector was last reset
    pub total_ticks: u64,

    /// Wake-ups armed with the drift-corrected or fixed delay
    pub delayed_wakes: u64,

    /// Wake-ups armed on the catch-up path
    pub immediate_wakes: u64,

    /// Lateness of the most recent tick in milliseconds
    pub last_lateness_ms: u64,

    /// Average lateness in milliseconds over the recent history
    pub avg_lateness_ms: u64,

    /// Maximum lateness in milliseconds
    pub max_lateness_ms: u64,

    /// 95th percentile lateness in milliseconds
    pub p95_lateness_ms: u64,

    /// 99th percentile lateness in milliseconds
    pub p99_lateness_ms: u64,
}

/// Metrics collector for the TickScheduler
#[derive(Debug)]
pub struct MetricsCollector {
    // Tick metrics
    lateness: Vec<AtomicU64>,
    last_lateness: AtomicU64,
    max_lateness: AtomicU64,
    total_ticks: AtomicU64,

    // Arming metrics
    delayed_wakes: AtomicU64,
    immediate_wakes: AtomicU64,

    // Configuration
    history_size: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        let mut lateness = Vec::with_capacity(history_size);
        for _ in 0..history_size {
            lateness.push(AtomicU64::new(0));
        }

        Self {
            lateness,
            last_lateness: AtomicU64::new(0),
            max_lateness: AtomicU64::new(0),
            total_ticks: AtomicU64::new(0),
            delayed_wakes: AtomicU64::new(0),
            immediate_wakes: AtomicU64::new(0),
            history_size,
        }
    }

    /// Record a delivered tick and how late it was against its ideal boundary
    pub fn record_tick(&self, lateness_ms: u64) {
        let tick = self.total_ticks.fetch_add(1, Ordering::Relaxed);
        let index = (tick as usize) % self.history_size;

        self.lateness[index].store(lateness_ms, Ordering::Relaxed);
        self.last_lateness.store(lateness_ms, Ordering::Relaxed);
        self.max_lateness.fetch_max(lateness_ms, Ordering::Relaxed);
    }

    /// Record an armed wake-up
    pub fn record_wake(&self, immediate: bool) {
        if immediate {
            self.immediate_wakes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.delayed_wakes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> TickMetrics {
        let total_ticks = self.total_ticks.load(Ordering::Relaxed);
        let recorded = (total_ticks as usize).min(self.history_size);

        // Calculate statistics from recent history
        let mut samples: Vec<u64> =
            self.lateness.iter().take(recorded).map(|l| l.load(Ordering::Relaxed)).collect();
        samples.sort_unstable();

        let avg_lateness_ms = if !samples.is_empty() {
            samples.iter().sum::<u64>() / samples.len() as u64
        } else {
            0
        };

        TickMetrics {
            total_ticks,
            delayed_wakes: self.delayed_wakes.load(Ordering::Relaxed),
            immediate_wakes: self.immediate_wakes.load(Ordering::Relaxed),
            last_lateness_ms: self.last_lateness.load(Ordering::Relaxed),
            avg_lateness_ms,
            max_lateness_ms: self.max_lateness.load(Ordering::Relaxed),
            p95_lateness_ms: percentile(&samples, 0.95),
            p99_lateness_ms: percentile(&samples, 0.99),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.last_lateness.store(0, Ordering::Relaxed);
        self.max_lateness.store(0, Ordering::Relaxed);
        self.total_ticks.store(0, Ordering::Relaxed);
        self.delayed_wakes.store(0, Ordering::Relaxed);
        self.immediate_wakes.store(0, Ordering::Relaxed);

        for sample in self.lateness.iter() {
            sample.store(0, Ordering::Relaxed);
        }
    }
}

fn percentile(sorted: &[u64], quantile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (sorted.len() as f64 * quantile) as usize;
    sorted[index.min(sorted.len() - 1)]
}
