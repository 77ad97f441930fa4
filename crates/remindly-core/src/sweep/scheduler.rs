//! Interval bookkeeping for the three sweeps.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::SweepKind;

/// Tracks when each sweep last ran and which ones are due.
///
/// Sweeps that never ran are due immediately.
#[derive(Debug, Default)]
pub struct Scheduler {
    last_run: BTreeMap<SweepKind, Instant>,
    cancelled: BTreeSet<SweepKind>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps due at `now`, marking them as run.
    pub fn take_due(&mut self, now: Instant) -> Vec<SweepKind> {
        let due: Vec<SweepKind> = SweepKind::ALL
            .into_iter()
            .filter(|kind| !self.cancelled.contains(kind))
            .filter(|kind| match self.last_run.get(kind) {
                Some(last) => now.saturating_duration_since(*last) >= kind.interval(),
                None => true,
            })
            .collect();

        for kind in &due {
            self.last_run.insert(*kind, now);
        }
        due
    }

    /// Time until the next sweep is due, or `None` when all are cancelled.
    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        SweepKind::ALL
            .into_iter()
            .filter(|kind| !self.cancelled.contains(kind))
            .map(|kind| match self.last_run.get(&kind) {
                Some(last) => kind
                    .interval()
                    .saturating_sub(now.saturating_duration_since(*last)),
                None => Duration::ZERO,
            })
            .min()
    }

    /// Stop running `kind` until [`Scheduler::resume`].
    pub fn cancel(&mut self, kind: SweepKind) {
        self.cancelled.insert(kind);
    }

    /// Resume `kind`; it becomes due immediately.
    pub fn resume(&mut self, kind: SweepKind) {
        self.cancelled.remove(&kind);
        self.last_run.remove(&kind);
    }

    pub fn is_cancelled(&self, kind: SweepKind) -> bool {
        self.cancelled.contains(&kind)
    }
}

/// Cloneable stop flag for the sweep loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_due_on_first_tick() {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        assert_eq!(scheduler.take_due(start), SweepKind::ALL.to_vec());
        assert!(scheduler.take_due(start).is_empty());
    }

    #[test]
    fn test_intervals() {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        scheduler.take_due(start);

        assert_eq!(scheduler.until_next(start), Some(Duration::from_secs(120)));
        assert_eq!(
            scheduler.take_due(start + Duration::from_secs(120)),
            vec![SweepKind::Medication]
        );
        assert_eq!(
            scheduler.take_due(start + Duration::from_secs(300)),
            vec![SweepKind::DailyDigest, SweepKind::Medication]
        );
        assert_eq!(
            scheduler.take_due(start + Duration::from_secs(3600)),
            SweepKind::ALL.to_vec()
        );
    }

    #[test]
    fn test_cancel_and_resume() {
        let mut scheduler = Scheduler::new();
        let start = Instant::now();
        scheduler.cancel(SweepKind::Medication);
        assert_eq!(
            scheduler.take_due(start),
            vec![SweepKind::Reminder, SweepKind::DailyDigest]
        );
        assert!(scheduler.is_cancelled(SweepKind::Medication));

        scheduler.resume(SweepKind::Medication);
        assert_eq!(scheduler.take_due(start), vec![SweepKind::Medication]);

        for kind in SweepKind::ALL {
            scheduler.cancel(kind);
        }
        assert_eq!(scheduler.until_next(start), None);
    }

    #[test]
    fn test_shutdown_handle_shared() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_shutdown());
        clone.shutdown();
        assert!(handle.is_shutdown());
    }
}
