// manager/manager.rs
use std::sync::{Arc, Mutex, PoisonError};

use code_runner::{AttemptExecutor, AttemptRequest, Budgets, Outcome, SandboxError};
use tokio::sync::Notify;

use crate::manager::queue::Queue;

/// Runs attempts through an [`AttemptExecutor`], never more than
/// `max_concurrent` at a time. Excess attempts wait in arrival order.
///
/// Cloning is cheap; clones share the same executor and queue.
#[derive(Clone)]
pub struct AttemptManager {
    executor: Arc<dyn AttemptExecutor>,
    queue: Arc<Mutex<Queue>>,
}

impl AttemptManager {
    pub fn new(executor: Arc<dyn AttemptExecutor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            queue: Arc::new(Mutex::new(Queue::new(max_concurrent))),
        }
    }

    /// Runs an attempt, either immediately or after waiting in queue.
    ///
    /// Dropping the returned future at any point gives the slot back.
    pub async fn run(
        &self,
        request: &AttemptRequest,
        budgets: &Budgets,
    ) -> Result<Outcome, SandboxError> {
        let _slot = SlotGuard::acquire(&self.queue).await;
        tracing::debug!(task_id = %request.task_id, "Attempt admitted");
        self.executor.execute(request, budgets).await
    }

    /// Attempts currently holding a slot.
    pub fn running(&self) -> usize {
        lock(&self.queue).running()
    }

    /// Attempts waiting for a slot.
    pub fn waiting(&self) -> usize {
        lock(&self.queue).waiting()
    }
}

fn lock(queue: &Mutex<Queue>) -> std::sync::MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds a queue slot, or a ticket for one, until dropped.
struct SlotGuard {
    queue: Arc<Mutex<Queue>>,
    ticket: Option<Arc<Notify>>,
    granted: bool,
}

impl SlotGuard {
    async fn acquire(queue: &Arc<Mutex<Queue>>) -> Self {
        let ticket = lock(queue).try_acquire_slot();
        let mut guard = Self {
            queue: Arc::clone(queue),
            granted: ticket.is_none(),
            ticket,
        };

        // Wait outside the mutex. If this future is dropped here, Drop withdraws the ticket.
        if let Some(ticket) = guard.ticket.clone() {
            ticket.notified().await;
            guard.granted = true;
        }
        guard
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut queue = lock(&self.queue);
        match (&self.ticket, self.granted) {
            (Some(ticket), false) => queue.withdraw(ticket),
            _ => queue.release_slot(),
        }
    }
}
