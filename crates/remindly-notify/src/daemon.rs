//! The sweep loop.

use std::io::Read;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use remindly_core::sweep::{Dispatcher, Scheduler, ShutdownHandle, SweepKind, SweepReport};
use remindly_core::RemindlyCore;

/// Runs due sweeps on a single thread until shut down.
pub struct Daemon<D: Dispatcher> {
    core: RemindlyCore,
    dispatcher: D,
    scheduler: Scheduler,
    shutdown: ShutdownHandle,
}

impl<D: Dispatcher> Daemon<D> {
    pub fn new(core: RemindlyCore, dispatcher: D) -> Self {
        Self {
            core,
            dispatcher,
            scheduler: Scheduler::new(),
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn core(&self) -> &RemindlyCore {
        &self.core
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Run every sweep that is due at `instant`, using `now` as wall-clock time.
    ///
    /// Errors are logged; a failing sweep never stops the others.
    pub fn tick(&mut self, instant: Instant, now: NaiveDateTime) -> Vec<(SweepKind, SweepReport)> {
        let mut reports = Vec::new();

        for kind in self.scheduler.take_due(instant) {
            if kind == SweepKind::Reminder {
                match self.core.refresh_next_payment_dates(now) {
                    Ok(0) => {}
                    Ok(updated) => tracing::info!(updated, "refreshed next payment dates"),
                    Err(e) => tracing::warn!(error = %e, "failed to refresh next payment dates"),
                }
            }

            match self.core.run_sweep(kind, now, &self.dispatcher) {
                Ok(Some(report)) => {
                    if report.sent > 0 || report.pruned > 0 {
                        tracing::info!(
                            sweep = kind.as_str(),
                            sent = report.sent,
                            failed = report.dispatch_failures,
                            pruned = report.pruned,
                            "sweep finished"
                        );
                    }
                    reports.push((kind, report));
                }
                Ok(None) => tracing::debug!(sweep = kind.as_str(), "no user signed in"),
                Err(e) => tracing::error!(sweep = kind.as_str(), error = %e, "sweep failed"),
            }
        }

        reports
    }

    /// Loop until the shutdown handle fires, sleeping at most `max_sleep`
    /// between ticks. Tears the session down on exit.
    ///
    /// Nothing fires the handle on its own: a host either holds a
    /// [`ShutdownHandle`] or uses [`shutdown_on_eof`]. A process killed by a
    /// signal exits without the teardown.
    pub fn run(&mut self, max_sleep: Duration) {
        tracing::info!("sweep loop started");

        loop {
            let now = chrono::Local::now().naive_local();
            self.tick(Instant::now(), now);

            if self.shutdown.is_shutdown() {
                break;
            }

            let wait = self
                .scheduler
                .until_next(Instant::now())
                .unwrap_or(max_sleep)
                .min(max_sleep);
            std::thread::sleep(wait);

            if self.shutdown.is_shutdown() {
                break;
            }
        }

        for kind in SweepKind::ALL {
            self.scheduler.cancel(kind);
        }
        if let Err(e) = self.core.session().teardown() {
            tracing::warn!(error = %e, "session teardown failed");
        }
        tracing::info!("sweep loop stopped");
    }
}

/// Fire `handle` once `input` reaches end of file.
///
/// Lets a parent process stop the loop by closing the child's stdin.
pub fn shutdown_on_eof<R: Read + Send + 'static>(mut input: R, handle: ShutdownHandle) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut buf = [0u8; 256];
        loop {
            match input.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read shutdown input, stopping");
                    break;
                }
            }
        }
        tracing::info!("input closed, shutting down");
        handle.shutdown();
    })
}
