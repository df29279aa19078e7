//! Recurring scheduler.
//!
//! Runs a cycle immediately, then again one interval after each cycle
//! finishes, until shutdown. Two failure domains are isolated here:
//!
//! - a cycle that errors or panics is logged, then the loop backs off
//! - a panic in the loop's own timing step is logged, then the loop backs off
//!
//! Neither stops future cycles: once the backoff elapses the next cycle is
//! due immediately. The in-flight cycle always finishes before shutdown is
//! honored.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::panic_message;
use crate::pipeline::CycleReport;

/// Something the scheduler can run on a timer.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self) -> anyhow::Result<CycleReport>;
}

/// Held while a cycle runs; a second acquisition fails until it drops.
pub struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of one scheduled firing.
#[derive(Debug)]
pub enum Firing {
    Ran(CycleReport),
    /// Another cycle was still running; nothing was started
    Overlapped,
    /// The cycle escaped with an error or panic
    Failed(String),
}

enum Step {
    Continue,
    CycleFailed,
    Shutdown,
}

pub struct Scheduler<R> {
    runner: R,
    config: SchedulerConfig,
    running: AtomicBool,
    #[cfg(test)]
    on_tick: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<R: CycleRunner> Scheduler<R> {
    pub fn new(runner: R, config: SchedulerConfig) -> Self {
        Self {
            runner,
            config,
            running: AtomicBool::new(false),
            #[cfg(test)]
            on_tick: None,
        }
    }

    pub fn is_cycle_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cycle unless one is already running.
    pub async fn fire(&self) -> Firing {
        let Some(_guard) = CycleGuard::try_acquire(&self.running) else {
            warn!("Previous scrape cycle still running, skipping this firing");
            return Firing::Overlapped;
        };

        match AssertUnwindSafe(self.runner.run_cycle()).catch_unwind().await {
            Ok(Ok(report)) => Firing::Ran(report),
            Ok(Err(e)) => {
                error!(error = %e, "Scrape cycle failed");
                Firing::Failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Scrape cycle panicked");
                Firing::Failed(message)
            }
        }
    }

    /// Drive cycles until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting job scheduler"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = AssertUnwindSafe(self.step(&mut ticker, &shutdown))
                .catch_unwind()
                .await;

            let failed = match step {
                Ok(Step::Continue) => false,
                Ok(Step::Shutdown) => break,
                Ok(Step::CycleFailed) => true,
                Err(payload) => {
                    error!(panic = %panic_message(payload.as_ref()), "Scheduler loop failed");
                    true
                }
            };

            if failed {
                warn!(
                    backoff_secs = self.config.failure_backoff.as_secs(),
                    "Backing off before resuming schedule"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.failure_backoff) => {}
                }
                ticker.reset_immediately();
            }
        }

        info!("Job scheduler stopped");
    }

    async fn step(&self, ticker: &mut Interval, shutdown: &CancellationToken) -> Step {
        tokio::select! {
            _ = shutdown.cancelled() => return Step::Shutdown,
            _ = ticker.tick() => {}
        }

        #[cfg(test)]
        if let Some(on_tick) = &self.on_tick {
            on_tick();
        }

        let firing = self.fire().await;
        // Next firing is one interval after this cycle ended.
        ticker.reset();

        match firing {
            Firing::Ran(_) | Firing::Overlapped => Step::Continue,
            Firing::Failed(_) => Step::CycleFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CycleOutcome, ExhaustionReason};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Error,
        /// Errors on the first call only
        ErrorOnce,
        Panic,
        Slow(Duration),
    }

    struct ScriptedRunner {
        calls: Arc<AtomicUsize>,
        behavior: Behavior,
    }

    fn report() -> CycleReport {
        CycleReport {
            cycle_id: Uuid::now_v7(),
            started_at: Utc::now(),
            pages_visited: 1,
            cards_seen: 0,
            records_added: 0,
            duplicates: 0,
            cards_skipped: 0,
            persist_failures: 0,
            duration_ms: 0,
            outcome: CycleOutcome::Completed {
                reason: ExhaustionReason::NoNextControl,
            },
        }
    }

    #[async_trait]
    impl CycleRunner for ScriptedRunner {
        async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(report()),
                Behavior::Error => Err(anyhow::anyhow!("browser crashed")),
                Behavior::ErrorOnce if call == 0 => Err(anyhow::anyhow!("browser crashed")),
                Behavior::ErrorOnce => Ok(report()),
                Behavior::Panic => panic!("cycle bug"),
                Behavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(report())
                }
            }
        }
    }

    fn scheduler(behavior: Behavior) -> (Arc<Scheduler<ScriptedRunner>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = ScriptedRunner {
            calls: Arc::clone(&calls),
            behavior,
        };
        (Arc::new(Scheduler::new(runner, SchedulerConfig::default())), calls)
    }

    async fn run_for(scheduler: Arc<Scheduler<ScriptedRunner>>, elapsed: Duration) {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { scheduler.run(shutdown).await }
        });
        tokio::time::sleep(elapsed).await;
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let (scheduler, calls) = scheduler(Behavior::Succeed);

        run_for(scheduler, Duration::from_secs(400)).await;

        // t = 0, 180, 360
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_cycle_retries_when_backoff_ends() {
        let (scheduler, calls) = scheduler(Behavior::Error);

        run_for(scheduler, Duration::from_secs(90)).await;

        // t = 0 fails, retried at 60
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_cycle_returns_to_interval() {
        let (scheduler, calls) = scheduler(Behavior::ErrorOnce);

        run_for(scheduler, Duration::from_secs(300)).await;

        // t = 0 fails, 60 succeeds, 240 on schedule
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_does_not_stop_scheduler() {
        let (scheduler, calls) = scheduler(Behavior::Panic);

        run_for(Arc::clone(&scheduler), Duration::from_secs(90)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_cycle_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_step_panic_resumes_after_backoff() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = ScriptedRunner {
            calls: Arc::clone(&calls),
            behavior: Behavior::Succeed,
        };
        let mut scheduler = Scheduler::new(runner, SchedulerConfig::default());
        let panicked = Arc::new(AtomicBool::new(false));
        scheduler.on_tick = Some(Box::new({
            let panicked = Arc::clone(&panicked);
            move || {
                if !panicked.swap(true, Ordering::SeqCst) {
                    panic!("clock went backwards");
                }
            }
        }));
        let scheduler = Arc::new(scheduler);

        run_for(Arc::clone(&scheduler), Duration::from_secs(90)).await;

        // t = 0 step panics, backoff to 60, cycle runs at 60
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_cycle_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_firing_is_refused() {
        let (scheduler, calls) = scheduler(Behavior::Slow(Duration::from_secs(10)));

        let (first, second) = tokio::join!(scheduler.fire(), scheduler.fire());

        assert!(matches!(first, Firing::Ran(_)));
        assert!(matches!(second, Firing::Overlapped));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_cycle_running());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = CycleGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(CycleGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(CycleGuard::try_acquire(&flag).is_some());
    }
}
