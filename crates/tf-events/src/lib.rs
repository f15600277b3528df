//! Per-thread monitor counters (§7 "the thread driver reports monitor
//! counters... but not errors") and the `tracing` instrumentation
//! conventions the rest of the workspace follows.
//!
//! Counters are plain atomics, not a metrics-crate integration: one
//! [`WindowCounters`] lives per worker thread alongside its `WindowState`,
//! incremented inline during the pipeline and logged (or inspected by
//! tests) at window end.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monitor counters for one window's pipeline run. All increments use
/// `Ordering::Relaxed`: counters are read back only by the owning thread
/// (via [`WindowCounters::snapshot`]) or by tests, never raced across
/// threads.
#[derive(Debug, Default)]
pub struct WindowCounters {
    pub doublets_built: AtomicU64,
    pub triplets_built: AtomicU64,
    pub candidates_created: AtomicU64,
    pub candidates_survived_competition: AtomicU64,
    pub tracks_extended: AtomicU64,
    pub tracks_fitted: AtomicU64,
    pub clones_merged: AtomicU64,
}

/// Point-in-time copy of [`WindowCounters`], convenient for logging or
/// asserting on in tests without touching the atomics themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowCountersSnapshot {
    pub doublets_built: u64,
    pub triplets_built: u64,
    pub candidates_created: u64,
    pub candidates_survived_competition: u64,
    pub tracks_extended: u64,
    pub tracks_fitted: u64,
    pub clones_merged: u64,
}

impl WindowCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doublets(&self, n: u64) {
        self.doublets_built.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_triplets(&self, n: u64) {
        self.triplets_built.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_candidates_created(&self, n: u64) {
        self.candidates_created.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_candidates_survived(&self, n: u64) {
        self.candidates_survived_competition.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_tracks_extended(&self, n: u64) {
        self.tracks_extended.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_tracks_fitted(&self, n: u64) {
        self.tracks_fitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_clones_merged(&self, n: u64) {
        self.clones_merged.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WindowCountersSnapshot {
        WindowCountersSnapshot {
            doublets_built: self.doublets_built.load(Ordering::Relaxed),
            triplets_built: self.triplets_built.load(Ordering::Relaxed),
            candidates_created: self.candidates_created.load(Ordering::Relaxed),
            candidates_survived_competition: self.candidates_survived_competition.load(Ordering::Relaxed),
            tracks_extended: self.tracks_extended.load(Ordering::Relaxed),
            tracks_fitted: self.tracks_fitted.load(Ordering::Relaxed),
            clones_merged: self.clones_merged.load(Ordering::Relaxed),
        }
    }

    /// Emits a `debug`-level summary event for one window, then resets every
    /// counter so the next window starts from zero. Named after the
    /// reference tracker's per-iteration monitor report.
    pub fn report_and_reset(&self, window_index: u64) -> WindowCountersSnapshot {
        let snapshot = self.snapshot();
        tracing::debug!(
            target: "tf_events::window",
            window_index,
            doublets_built = snapshot.doublets_built,
            triplets_built = snapshot.triplets_built,
            candidates_created = snapshot.candidates_created,
            candidates_survived_competition = snapshot.candidates_survived_competition,
            tracks_extended = snapshot.tracks_extended,
            tracks_fitted = snapshot.tracks_fitted,
            clones_merged = snapshot.clones_merged,
            "window pipeline summary"
        );
        self.doublets_built.store(0, Ordering::Relaxed);
        self.triplets_built.store(0, Ordering::Relaxed);
        self.candidates_created.store(0, Ordering::Relaxed);
        self.candidates_survived_competition.store(0, Ordering::Relaxed);
        self.tracks_extended.store(0, Ordering::Relaxed);
        self.tracks_fitted.store(0, Ordering::Relaxed);
        self.clones_merged.store(0, Ordering::Relaxed);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_snapshots() {
        let counters = WindowCounters::new();
        counters.add_triplets(3);
        counters.add_triplets(2);
        counters.add_candidates_created(4);
        let snap = counters.snapshot();
        assert_eq!(snap.triplets_built, 5);
        assert_eq!(snap.candidates_created, 4);
    }

    #[test]
    fn report_and_reset_zeroes_counters() {
        let counters = WindowCounters::new();
        counters.add_doublets(10);
        let snap = counters.report_and_reset(0);
        assert_eq!(snap.doublets_built, 10);
        assert_eq!(counters.snapshot().doublets_built, 0);
    }
}
