use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use course_core::Clock;
use course_core::model::ProgressState;
use storage::repository::SnapshotStore;
use storage::snapshot::ProgressSnapshot;

pub(crate) fn lock_state(state: &Mutex<ProgressState>) -> MutexGuard<'_, ProgressState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background task that persists the full progress state after changes.
///
/// Every mutation bumps a generation counter; the task wakes, snapshots the
/// latest state and writes it. Bursts of changes collapse into one write and
/// the last write always carries the newest state.
pub(crate) struct SnapshotWriter {
    dirty: watch::Sender<u64>,
    written: watch::Receiver<u64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotWriter {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn(
        state: Arc<Mutex<ProgressState>>,
        store: SnapshotStore,
        clock: Clock,
    ) -> Self {
        let (dirty, dirty_rx) = watch::channel(0_u64);
        let (written_tx, written) = watch::channel(0_u64);
        let task = tokio::spawn(run(dirty_rx, written_tx, state, store, clock));
        Self {
            dirty,
            written,
            task: Mutex::new(Some(task)),
        }
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.send_modify(|generation| *generation += 1);
    }

    /// Wait until every change marked so far has been written (or failed).
    pub(crate) async fn flush(&self) {
        let target = *self.dirty.borrow();
        let mut written = self.written.clone();
        if written.wait_for(|done| *done >= target).await.is_err() {
            warn!("snapshot writer stopped before flushing");
        }
    }

    /// Flush pending changes and stop the background task.
    pub(crate) async fn close(&self) {
        self.flush().await;
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn run(
    mut dirty: watch::Receiver<u64>,
    written: watch::Sender<u64>,
    state: Arc<Mutex<ProgressState>>,
    store: SnapshotStore,
    clock: Clock,
) {
    // `changed` still reports a final unseen generation after the sender drops.
    while dirty.changed().await.is_ok() {
        let generation = *dirty.borrow_and_update();
        let snapshot = ProgressSnapshot::from_state(&lock_state(&state), clock.now());
        match store.save(&snapshot).await {
            Ok(()) => debug!(generation, "progress snapshot written"),
            Err(err) => warn!(%err, generation, "failed to persist progress snapshot"),
        }
        written.send_replace(generation);
    }
}
