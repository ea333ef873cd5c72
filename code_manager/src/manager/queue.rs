//manager/queue.rs
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// FIFO admission queue bounding how many attempts run at once.
pub struct Queue {
    max_concurrent: usize,
    running: usize,
    waiting: VecDeque<Arc<Notify>>,
}

impl Queue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            running: 0,
            waiting: VecDeque::new(),
        }
    }

    /// Called when an attempt begins.
    /// Returns `None` if a slot was free, otherwise a ticket to wait on.
    pub fn try_acquire_slot(&mut self) -> Option<Arc<Notify>> {
        if self.running < self.max_concurrent {
            self.running += 1;
            None // Run instantly
        } else {
            let notify = Arc::new(Notify::new());
            self.waiting.push_back(notify.clone());
            Some(notify)
        }
    }

    /// Called when an attempt completes. Hands the slot straight to the
    /// oldest waiter, if any.
    pub fn release_slot(&mut self) {
        self.running = self.running.saturating_sub(1);

        if let Some(waiting_task) = self.waiting.pop_front() {
            self.running += 1;
            waiting_task.notify_one();
        }
    }

    /// Gives up a ticket. If the ticket is still queued it is simply removed;
    /// if it was already granted a slot, that slot is released.
    pub fn withdraw(&mut self, ticket: &Arc<Notify>) {
        match self.waiting.iter().position(|w| Arc::ptr_eq(w, ticket)) {
            Some(pos) => {
                self.waiting.remove(pos);
            }
            None => self.release_slot(),
        }
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }
}
