//! Quiet-window scheduling for album finalization.
//!
//! A batch gets exactly one deferred task, armed when its first item lands.
//! The task sleeps for the configured window and then runs the supplied
//! finalize future. Later arrivals for the same batch never re-arm.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::types::BatchId;

/// Default quiet window applied after the first item of an album.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(1500);

struct PendingFinalize {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct SchedulerState {
    pending: HashMap<BatchId, PendingFinalize>,
    next_generation: u64,
}

/// Owns every pending finalize task so they can be observed, cancelled and
/// awaited. Cloning yields another handle onto the same scheduler.
#[derive(Clone)]
pub struct DebounceScheduler {
    quiet_window: Duration,
    state: Arc<Mutex<SchedulerState>>,
    tracker: TaskTracker,
}

impl DebounceScheduler {
    pub fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            tracker: TaskTracker::new(),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    /// Schedules `finalize` to run once the quiet window has elapsed.
    ///
    /// Returns `false` without scheduling anything when a finalize for
    /// `batch_id` is already waiting.
    pub fn arm<F>(&self, batch_id: BatchId, finalize: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.pending.contains_key(&batch_id) {
                warn!(
                    target: "bouquet::media::scheduler",
                    batch_id = %batch_id,
                    "Finalize already pending for batch, not re-arming"
                );
                return false;
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.pending.insert(
                batch_id.clone(),
                PendingFinalize {
                    generation,
                    token: token.clone(),
                },
            );
            generation
        };

        debug!(
            target: "bouquet::media::scheduler",
            batch_id = %batch_id,
            window_ms = self.quiet_window.as_millis() as u64,
            "Armed finalize"
        );

        let state = self.state.clone();
        let window = self.quiet_window;
        self.tracker.spawn(async move {
            let cancelled = tokio::select! {
                () = token.cancelled() => true,
                () = tokio::time::sleep(window) => false,
            };

            {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state
                    .pending
                    .get(&batch_id)
                    .is_some_and(|p| p.generation == generation)
                {
                    state.pending.remove(&batch_id);
                }
            }

            if cancelled {
                debug!(
                    target: "bouquet::media::scheduler",
                    batch_id = %batch_id,
                    "Finalize cancelled before quiet window elapsed"
                );
                return;
            }

            finalize.await;
        });
        true
    }

    /// Cancels the pending finalize for `batch_id`, if one is still waiting.
    pub fn cancel(&self, batch_id: &BatchId) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.pending.get(batch_id) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of finalize tasks still inside their quiet window.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    pub fn is_pending(&self, batch_id: &BatchId) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .contains_key(batch_id)
    }

    /// Waits until every finalize task spawned so far has completed.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for DebounceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceScheduler")
            .field("quiet_window", &self.quiet_window)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_quiet_window() {
        let scheduler = DebounceScheduler::new(Duration::from_millis(1500));
        let fired = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.arm(BatchId::from("a"), counter_task(&fired)));
        assert!(scheduler.is_pending(&BatchId::from("a")));

        tokio::time::advance(Duration::from_millis(1000)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(600)).await;
        scheduler.wait_idle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_arm_for_same_batch_is_rejected() {
        let scheduler = DebounceScheduler::new(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.arm(BatchId::from("a"), counter_task(&fired)));
        assert!(!scheduler.arm(BatchId::from("a"), counter_task(&fired)));
        assert!(scheduler.arm(BatchId::from("b"), counter_task(&fired)));

        scheduler.wait_idle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_can_be_rearmed_once_fired() {
        let scheduler = DebounceScheduler::new(Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.arm(BatchId::from("a"), counter_task(&fired)));
        scheduler.wait_idle().await;
        assert!(scheduler.arm(BatchId::from("a"), counter_task(&fired)));
        scheduler.wait_idle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_finalize_never_runs() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(5));
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.arm(BatchId::from("a"), counter_task(&fired));
        assert!(scheduler.cancel(&BatchId::from("a")));
        scheduler.wait_idle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.cancel(&BatchId::from("a")));
    }

    #[tokio::test]
    async fn arming_does_not_block_caller() {
        let scheduler = DebounceScheduler::new(Duration::from_secs(3600));
        let fired = Arc::new(AtomicUsize::new(0));

        let started = std::time::Instant::now();
        scheduler.arm(BatchId::from("slow"), counter_task(&fired));
        assert!(started.elapsed() < Duration::from_secs(1));

        scheduler.cancel(&BatchId::from("slow"));
        scheduler.wait_idle().await;
    }
}
