//! Single-threaded task queue and revocable callbacks.
//!
//! A `TaskQueue` is bound to the thread that created it. Updaters post
//! deferred work onto it and the owning loop drains it between messages,
//! so every state transition of an updater happens on one thread.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread::{self, ThreadId};

type Task = Box<dyn FnOnce()>;

struct QueueInner {
    tasks: RefCell<VecDeque<Task>>,
    owner: ThreadId,
}

/// FIFO of deferred tasks owned by one thread
#[derive(Clone)]
pub struct TaskQueue {
    inner: Rc<QueueInner>,
}

impl TaskQueue {
    /// Create a queue bound to the current thread
    pub fn new() -> Self {
        Self {
            inner: Rc::new(QueueInner {
                tasks: RefCell::new(VecDeque::new()),
                owner: thread::current().id(),
            }),
        }
    }

    /// Whether the caller runs on the queue's thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// Queue a task to run on the next drain
    pub fn post(&self, task: impl FnOnce() + 'static) {
        debug_assert!(self.is_current(), "task posted from a foreign thread");
        self.inner.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run tasks until the queue is empty, including ones posted meanwhile.
    ///
    /// Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        debug_assert!(self.is_current(), "task queue drained from a foreign thread");

        let mut ran = 0;
        loop {
            let task = self.inner.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A token that callbacks check before running.
///
/// The owner revokes it first thing on teardown; queued work holding a
/// clone then becomes a no-op.
#[derive(Clone, Default)]
pub struct CancellationToken {
    revoked: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self) {
        self.revoked.set(true);
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_order() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            queue.post(move || log.borrow_mut().push(i));
        }

        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_tasks_posted_while_draining_also_run() {
        let queue = TaskQueue::new();
        let hits = Rc::new(Cell::new(0));

        let inner_queue = queue.clone();
        let inner_hits = hits.clone();
        queue.post(move || {
            let hits = inner_hits.clone();
            inner_queue.post(move || hits.set(hits.get() + 1));
            inner_hits.set(inner_hits.get() + 1);
        });

        assert_eq!(queue.run_pending(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert!(!clone.is_revoked());
        token.revoke();
        assert!(clone.is_revoked());
    }
}
