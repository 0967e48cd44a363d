//! Long-press deadline scheduler
//!
//! A single thread sleeps until the earliest armed deadline and hands it to
//! the fire callback. Entries carry the press generation they were armed for;
//! the callback decides whether the deadline is still current, so a
//! cancellation racing with a firing deadline is resolved by the decoder's own
//! state rather than by the queue.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use soomfon_transport::TransportError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    button: u8,
    generation: u64,
}

#[derive(Default)]
struct Queue {
    heap: BinaryHeap<Reverse<Deadline>>,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
}

pub(crate) struct LongPressTimer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl LongPressTimer {
    /// Start the scheduler thread; `fire(button, generation)` runs on it
    pub(crate) fn spawn<F>(fire: F) -> Result<Self, TransportError>
    where
        F: Fn(u8, u64) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("soomfon-long-press".into())
            .spawn(move || run(&worker, fire))
            .map_err(|e| TransportError::Internal(format!("spawn long-press timer: {e}")))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub(crate) fn arm(&self, at: Instant, button: u8, generation: u64) {
        self.shared.queue.lock().heap.push(Reverse(Deadline {
            at,
            button,
            generation,
        }));
        self.shared.wake.notify_one();
    }

    /// Drop pending deadlines of one button
    pub(crate) fn cancel(&self, button: u8) {
        self.shared
            .queue
            .lock()
            .heap
            .retain(|Reverse(d)| d.button != button);
    }

    /// Drop every pending deadline
    pub(crate) fn cancel_all(&self) {
        self.shared.queue.lock().heap.clear();
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.shared.queue.lock().heap.len()
    }
}

impl Drop for LongPressTimer {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.take() {
            // The last decoder handle may be released from inside a callback
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run<F: Fn(u8, u64)>(shared: &Shared, fire: F) {
    debug!("Long-press timer thread started");
    let mut queue = shared.queue.lock();

    loop {
        if queue.shutdown {
            break;
        }

        let next = queue.heap.peek().map(|Reverse(d)| *d);
        match next {
            None => shared.wake.wait(&mut queue),
            Some(d) if d.at <= Instant::now() => {
                queue.heap.pop();
                MutexGuard::unlocked(&mut queue, || fire(d.button, d.generation));
            }
            Some(d) => {
                shared.wake.wait_until(&mut queue, d.at);
            }
        }
    }

    debug!("Long-press timer thread exiting");
}
