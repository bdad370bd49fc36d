//! Named timer slots for deferred engine work.
//!
//! Each slot holds at most one pending task. Scheduling into an occupied
//! slot aborts the previous task first, so no orphaned callback can fire
//! against a surface that has since been replaced or destroyed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Deferred work the engine schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    /// Filter change waiting out the debounce window.
    Debounce,
    /// Surface initialization waiting for the mount point to be laid out.
    DeferredInit,
}

/// Pending tasks by slot.
#[derive(Debug, Default)]
pub struct Timers {
    slots: HashMap<TimerSlot, JoinHandle<()>>,
}

impl Timers {
    /// Run `task` after `delay`, replacing whatever was pending in `slot`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&mut self, slot: TimerSlot, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        self.slots.insert(slot, handle);
    }

    /// Abort the task in `slot`. Returns whether one was still pending.
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        match self.slots.remove(&slot) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.slots.drain() {
            handle.abort();
        }
    }

    pub fn is_pending(&self, slot: TimerSlot) -> bool {
        self.slots.get(&slot).is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_replaces_pending_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timers = Timers::default();

        for value in [1, 10] {
            let fired = fired.clone();
            timers.schedule(TimerSlot::Debounce, Duration::from_millis(100), async move {
                fired.fetch_add(value, Ordering::SeqCst);
            });
        }
        assert!(timers.is_pending(TimerSlot::Debounce));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(!timers.is_pending(TimerSlot::Debounce));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timers = Timers::default();
        for slot in [TimerSlot::Debounce, TimerSlot::DeferredInit] {
            let fired = fired.clone();
            timers.schedule(slot, Duration::from_millis(50), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        timers.cancel_all();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timers.cancel(TimerSlot::Debounce));
    }
}
