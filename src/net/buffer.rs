use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Ring size of the original hand-off queue. One slot is always kept
/// free, so `QUEUE_CAPACITY - 1` lines can be queued at once.
const QUEUE_CAPACITY: usize = 50;

/// Bounded FIFO hand-off from a peer's reader worker to its action
/// worker. `push` never blocks; a full buffer drops the newest line.
/// `pop` parks on the condvar until a line arrives or the producer side
/// closes the buffer.
#[derive(Debug)]
pub struct MessageBuffer {
    state: Mutex<BufferState>,
    available: Condvar,
}

#[derive(Debug)]
struct BufferState {
    queue: VecDeque<String>,
    closed: bool,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Queue one line for the action worker. Returns false (and drops the
    /// line) if the buffer is full or already closed.
    pub fn push(&self, line: String) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.queue.len() >= QUEUE_CAPACITY - 1 {
            return false;
        }
        state.queue.push_back(line);
        self.available.notify_one();
        true
    }

    /// Take the oldest queued line, blocking until one is available.
    /// Returns None once the buffer is closed and drained.
    pub fn pop(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some(line);
            }
            if state.closed {
                return None;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Mark the producer side finished and wake the consumer. Lines still
    /// queued remain poppable.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
