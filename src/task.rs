//! Delegated tasks.
//!
//! Key agreement, key derivation and certificate verification are handed to
//! the caller as [`DelegatedTask`]s instead of running inside `wrap` or
//! `unwrap`. A task writes its outcome into a shared slot that the engine
//! reads on the next call.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::crypto::KeyMaterial;
use crate::Error;

pub(crate) type TaskOutcome = Result<KeyMaterial, Error>;

type Slot = Arc<Mutex<Option<TaskOutcome>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<TaskOutcome>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A unit of deferred handshake work.
///
/// Obtained from `Engine::delegated_task`. Run it on any thread, then call
/// `wrap` or `unwrap` again.
pub struct DelegatedTask {
    job: Box<dyn FnOnce() -> TaskOutcome + Send>,
    slot: Slot,
}

impl DelegatedTask {
    /// Perform the work.
    pub fn run(self) {
        let outcome = (self.job)();
        *lock(&self.slot) = Some(outcome);
    }
}

impl fmt::Debug for DelegatedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedTask").finish_non_exhaustive()
    }
}

/// Tasks waiting to be drained, and slots of tasks handed out.
#[derive(Default)]
pub(crate) struct TaskQueue {
    queued: VecDeque<DelegatedTask>,
    running: Vec<Slot>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, job: F)
    where
        F: FnOnce() -> TaskOutcome + Send + 'static,
    {
        let slot: Slot = Arc::new(Mutex::new(None));
        self.running.push(slot.clone());
        self.queued.push_back(DelegatedTask {
            job: Box::new(job),
            slot,
        });
    }

    /// Hand the next task to the caller.
    pub fn next(&mut self) -> Option<DelegatedTask> {
        self.queued.pop_front()
    }

    /// Whether some task has not yet produced an outcome.
    pub fn is_pending(&self) -> bool {
        self.running.iter().any(|slot| {
            let guard = lock(slot);
            guard.is_none() && Arc::strong_count(slot) > 1
        })
    }

    /// Collect outcomes of finished tasks, oldest first.
    ///
    /// A task dropped by the caller without running counts as failed.
    pub fn take_finished(&mut self) -> Vec<TaskOutcome> {
        let mut finished = Vec::new();

        self.running.retain(|slot| {
            // The guard must span the strong count check: `run` stores the
            // outcome before it releases its handle on the slot.
            let mut guard = lock(slot);
            match guard.take() {
                Some(outcome) => {
                    finished.push(outcome);
                    false
                }
                None if Arc::strong_count(slot) == 1 => {
                    finished.push(Err(Error::CryptoError(
                        "delegated task dropped without running".to_string(),
                    )));
                    false
                }
                None => true,
            }
        });

        finished
    }

    /// Abandon all tasks, queued or handed out.
    pub fn clear(&mut self) {
        self.queued.clear();
        self.running.clear();
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("queued", &self.queued.len())
            .field("running", &self.running.len())
            .finish()
    }
}
