// ── Idle scheduler ──────────────────────────────────────────────────────────
//
// Background work (retraining) must never compete with the request path. The
// request path calls `touch()`; a tokio task ticks on an interval and, once
// nothing has touched the scheduler for `idle_after`, runs the idle task on
// the blocking pool. One run at a time: the loop awaits each run before the
// next tick.
//
// The handle is explicit. Nothing is global; shutting down is the owner's job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::config::SchedulerConfig;

/// Work to run while the request path is quiet. Runs on a blocking thread.
pub trait IdleTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn run_idle(&self);
}

#[derive(Debug)]
pub struct Scheduler {
    last_activity: Mutex<Instant>,
    idle_after: Duration,
    tick: Duration,
}

impl Scheduler {
    pub fn new(cfg: &SchedulerConfig) -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
            idle_after: Duration::from_millis(cfg.idle_after_ms),
            tick: Duration::from_millis(cfg.tick_ms.max(1)),
        }
    }

    /// Mark request-path activity.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn is_idle(&self) -> bool {
        self.idle_for() >= self.idle_after
    }

    /// Start the tick loop on the current tokio runtime.
    pub fn spawn(self: &Arc<Self>, task: Arc<dyn IdleTask>) -> EngineResult<SchedulerHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Other(format!("scheduler needs a tokio runtime: {e}")))?;

        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let scheduler = Arc::clone(self);
        let loop_stop = stop.clone();
        let loop_wake = wake.clone();

        info!(
            "[trustmem:scheduler] Started '{}' (tick {:?}, idle after {:?})",
            task.name(),
            scheduler.tick,
            scheduler.idle_after
        );

        let join = runtime.spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = loop_wake.notified() => {}
                }
                if loop_stop.load(Ordering::Relaxed) {
                    break;
                }
                if !scheduler.is_idle() {
                    continue;
                }
                let run = task.clone();
                debug!("[trustmem:scheduler] Idle, running '{}'", run.name());
                if let Err(e) = tokio::task::spawn_blocking(move || run.run_idle()).await {
                    warn!("[trustmem:scheduler] Idle task '{}' panicked: {}", task.name(), e);
                }
            }
            info!("[trustmem:scheduler] Stopped '{}'", task.name());
        });

        Ok(SchedulerHandle { stop, wake, join })
    }
}

/// Owner's handle on a running tick loop.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop the loop and wait for it. A run in progress completes first.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        self.wake.notify_one();
        if let Err(e) = self.join.await {
            warn!("[trustmem:scheduler] Tick loop ended abnormally: {}", e);
        }
    }
}
