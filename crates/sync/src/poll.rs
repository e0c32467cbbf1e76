//! Bounded repeating task
//!
//! Runs a step on a fixed interval until the step reports `Done`, the
//! attempt budget runs out, or the owner cancels it. The first attempt fires
//! one interval after start, so work dispatched just before has a chance to
//! land.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// What a step wants next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    Continue,
    Done,
}

/// How a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFinish {
    /// A step returned `Done`
    Converged,
    /// Budget spent without convergence
    Exhausted,
    /// Aborted through its handle
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub attempts: u32,
    pub finish: PollFinish,
}

/// `(interval, max_attempts)` repeating task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatingTask {
    interval: Duration,
    max_attempts: u32,
}

impl RepeatingTask {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run to completion on the current task
    ///
    /// `step` receives the 1-based attempt number.
    pub async fn run<F, Fut>(&self, mut step: F) -> PollReport
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PollStep>,
    {
        self.run_counted(&mut step, &AtomicU32::new(0)).await
    }

    /// Run on a background task
    ///
    /// `on_finish` runs on that task once the poll converges or exhausts its
    /// budget; it never runs for a cancelled poll.
    pub fn spawn<F, Fut, D>(self, mut step: F, on_finish: D) -> PollHandle
    where
        F: FnMut(u32) -> Fut + Send + 'static,
        Fut: Future<Output = PollStep> + Send + 'static,
        D: FnOnce(&PollReport) + Send + 'static,
    {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let handle = tokio::spawn(async move {
            let report = self.run_counted(&mut step, &counter).await;
            on_finish(&report);
            report
        });

        PollHandle { handle, attempts }
    }

    async fn run_counted<F, Fut>(&self, step: &mut F, counter: &AtomicU32) -> PollReport
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PollStep>,
    {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=self.max_attempts {
            timer.tick().await;
            counter.store(attempt, Ordering::Relaxed);

            if step(attempt).await == PollStep::Done {
                debug!("Poll converged after {} attempts", attempt);
                return PollReport {
                    attempts: attempt,
                    finish: PollFinish::Converged,
                };
            }
        }

        debug!("Poll exhausted after {} attempts", self.max_attempts);
        PollReport {
            attempts: self.max_attempts,
            finish: PollFinish::Exhausted,
        }
    }
}

/// Owned handle to a spawned poll
#[derive(Debug)]
pub struct PollHandle {
    handle: JoinHandle<PollReport>,
    attempts: Arc<AtomicU32>,
}

impl PollHandle {
    /// Abort the poll; no further steps run
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Wait for the poll to end
    pub async fn join(self) -> PollReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!("Poll task failed: {}", e);
                }
                PollReport {
                    attempts: self.attempts.load(Ordering::Relaxed),
                    finish: PollFinish::Cancelled,
                }
            }
        }
    }
}
