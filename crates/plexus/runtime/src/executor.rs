// Plexus
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Per-component task serialization.
//!
//! Registry events arrive on arbitrary threads, but lifecycle transitions of
//! one component must never interleave. A [`SerialQueue`] linearizes them:
//! the first thread to submit becomes the drainer and runs tasks until the
//! queue is empty; everyone else just appends and leaves. A task submitted
//! from within the drain (a callback publishing a service that loops back to
//! its own component) is appended too, so re-entrancy cannot deadlock.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::error;

type Task = Box<dyn FnOnce() + Send>;

struct QueuedTask {
    run: Task,
    completion: Option<Arc<Completion>>,
}

struct Completion {
    done: Mutex<bool>,
    signal: Condvar,
}

struct QueueState {
    tasks: VecDeque<QueuedTask>,
    drainer: Option<ThreadId>,
}

/// A serial task queue: tasks run one at a time, in submission order, on
/// whichever thread happens to be draining.
pub struct SerialQueue {
    state: Mutex<QueueState>,
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                drainer: None,
            }),
        }
    }

    /// Submit a task and return immediately. The task runs on this thread if
    /// the queue was idle, otherwise on the thread currently draining.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) {
        self.enqueue(QueuedTask {
            run: Box::new(task),
            completion: None,
        });
    }

    /// Submit a task and block until it has run.
    ///
    /// When the calling thread is itself the active drainer, the task runs
    /// immediately instead: the caller already holds the exclusive region,
    /// and waiting would starve the queue it is supposed to be draining.
    pub fn execute_and_wait(&self, task: impl FnOnce() + Send + 'static) {
        if self.is_current_drainer() {
            task();
            return;
        }

        let completion = Arc::new(Completion {
            done: Mutex::new(false),
            signal: Condvar::new(),
        });
        self.enqueue(QueuedTask {
            run: Box::new(task),
            completion: Some(Arc::clone(&completion)),
        });

        let mut done = completion.done.lock();
        while !*done {
            completion.signal.wait(&mut done);
        }
    }

    fn is_current_drainer(&self) -> bool {
        self.state.lock().drainer == Some(thread::current().id())
    }

    fn enqueue(&self, task: QueuedTask) {
        let becomes_drainer = {
            let mut state = self.state.lock();
            state.tasks.push_back(task);
            if state.drainer.is_none() {
                state.drainer = Some(thread::current().id());
                true
            } else {
                false
            }
        };
        if becomes_drainer {
            self.drain();
        }
    }

    fn drain(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.drainer = None;
                        return;
                    }
                }
            };

            if catch_unwind(AssertUnwindSafe(task.run)).is_err() {
                error!("Serialized task panicked; queue continues");
            }
            if let Some(completion) = task.completion {
                *completion.done.lock() = true;
                completion.signal.notify_all();
            }
        }
    }
}
