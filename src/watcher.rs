//! Background tracking of the active session count.
//!
//! The watcher polls [`ActiveSessions::count`] on a fixed interval and calls
//! the registered callback on the first observation and whenever the count
//! differs from the last one seen. Each poll, callback included, runs on the
//! blocking pool so the filesystem scan never stalls the caller's runtime. A
//! slow callback delays the next poll.

use crate::registry::ActiveSessions;
use crate::storage::PropertyStoreFactory;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Remembers the last observed count and decides when to notify.
#[derive(Debug, Default, Clone)]
pub struct CountTracker {
    last: Option<usize>,
}

impl CountTracker {
    /// Records `count`. Returns true if it is the first observation or differs
    /// from the previous one.
    pub fn observe(&mut self, count: usize) -> bool {
        if self.last == Some(count) {
            return false;
        }
        self.last = Some(count);
        true
    }

    pub fn last(&self) -> Option<usize> {
        self.last
    }
}

/// Handle to a running count watcher.
///
/// Dropping the handle aborts the task, though a poll already running on the
/// blocking pool still finishes. Use [`SessionCountWatcher::stop`] to wait
/// until no further callback can run.
pub struct SessionCountWatcher {
    tracker: Arc<Mutex<CountTracker>>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionCountWatcher {
    /// Spawns the polling task. Must be called from within a tokio runtime.
    pub fn start<F>(
        registry: Arc<ActiveSessions>,
        user_home: PathBuf,
        project_sharing_enabled: bool,
        interval: Duration,
        mut on_count_changed: F,
    ) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        let tracker = Arc::new(Mutex::new(CountTracker::default()));
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let task_tracker = tracker.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => {}
                }

                let registry = registry.clone();
                let user_home = user_home.clone();
                let tracker = task_tracker.clone();
                let poll = tokio::task::spawn_blocking(move || {
                    let count = registry.count(&user_home, project_sharing_enabled);
                    let changed = tracker
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .observe(count);

                    if changed {
                        tracing::debug!(count, "Active session count changed");
                        on_count_changed(count);
                    }
                    on_count_changed
                });

                match poll.await {
                    Ok(callback) => on_count_changed = callback,
                    Err(e) => {
                        tracing::warn!("Session count poll failed: {}", e);
                        break;
                    }
                }
            }

            tracing::debug!("Session count watcher stopped");
        });

        Self {
            tracker,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Last count the watcher observed, if it has polled at least once.
    pub fn last_count(&self) -> Option<usize> {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
    }

    /// Stops polling and waits for the task to finish. No callback runs after
    /// this returns.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::warn!("Session count watcher task panicked");
                }
            }
        }
    }
}

impl Drop for SessionCountWatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Watches the registry rooted at `root_storage_path` with the default
/// polling interval.
pub fn track_active_session_count<F>(
    factory: Arc<dyn PropertyStoreFactory>,
    root_storage_path: &Path,
    user_home: &Path,
    project_sharing_enabled: bool,
    on_count_changed: F,
) -> SessionCountWatcher
where
    F: FnMut(usize) + Send + 'static,
{
    let registry = Arc::new(ActiveSessions::new(factory, root_storage_path));
    SessionCountWatcher::start(
        registry,
        user_home.to_path_buf(),
        project_sharing_enabled,
        DEFAULT_POLL_INTERVAL,
        on_count_changed,
    )
}

#[cfg(test)]
#[path = "tests/watcher_tests.rs"]
mod tests;
