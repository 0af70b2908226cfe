use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Opaque handle addressing one live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutCookie(u64);

struct TimerEntry {
    deadline: Mutex<Instant>,
    duration: Duration,
    cancel: CancellationToken,
}

struct ManagerInner {
    timers: Mutex<HashMap<u64, Arc<TimerEntry>>>,
    next_id: AtomicU64,
}

/// One-shot timers with refresh semantics.
///
/// Each registered timer fires its callback at most once. `refresh` pushes
/// the deadline out by the original duration; `unregister` cancels. A fired
/// or unregistered cookie is forgotten, so stale refreshes are harmless.
///
/// Must be used from within a tokio runtime; each timer runs as a spawned
/// task that re-arms its sleep whenever the deadline has moved.
pub struct TimeoutManager {
    inner: Arc<ManagerInner>,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                timers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn register(
        &self,
        duration: Duration,
        callback: impl FnOnce() + Send + 'static,
    ) -> TimeoutCookie {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(TimerEntry {
            deadline: Mutex::new(Instant::now() + duration),
            duration,
            cancel: CancellationToken::new(),
        });
        self.inner
            .timers
            .lock()
            .unwrap()
            .insert(id, Arc::clone(&entry));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let deadline = *entry.deadline.lock().unwrap();
                tokio::select! {
                    _ = entry.cancel.cancelled() => return,
                    _ = tokio::time::sleep_until(deadline) => {
                        // A refresh may have moved the deadline while we slept.
                        if *entry.deadline.lock().unwrap() <= Instant::now() {
                            break;
                        }
                    }
                }
            }
            inner.timers.lock().unwrap().remove(&id);
            callback();
        });

        TimeoutCookie(id)
    }

    pub fn refresh(&self, cookie: TimeoutCookie) {
        let timers = self.inner.timers.lock().unwrap();
        match timers.get(&cookie.0) {
            Some(entry) => {
                *entry.deadline.lock().unwrap() = Instant::now() + entry.duration;
            }
            None => debug!(?cookie, "refresh of expired timeout ignored"),
        }
    }

    pub fn unregister(&self, cookie: TimeoutCookie) {
        if let Some(entry) = self.inner.timers.lock().unwrap().remove(&cookie.0) {
            entry.cancel.cancel();
        }
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        for entry in self.inner.timers.lock().unwrap().values() {
            entry.cancel.cancel();
        }
    }
}
