// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Condition Variable
//!
//! A FIFO wait queue with the standard release-park-reacquire protocol.
//! The condition variable owns no mutex; the caller pairs one per wait.
//!
//! Signals are not stored: signaling with no waiters is a no-op. Callers
//! must recheck their predicate in a loop, both because only wake-one is
//! the primary operation and because spurious wakeups are permitted.
//!
//! # Usage
//!
//! ```no_run
//! use threadux::sync::{Condvar, Mutex};
//!
//! static LOCK: Mutex = Mutex::new();
//! static COND: Condvar = Condvar::new();
//!
//! LOCK.lock().unwrap();
//! // while !predicate { ... }
//! COND.wait(&LOCK).unwrap();
//! LOCK.unlock().unwrap();
//! ```

use crate::err::{Error, Result};
use crate::preempt;
use crate::sched;
use crate::sync::mutex::Mutex;
use crate::sync::wait_queue::WaitQueue;
use crate::thread;

/// Condition variable with a FIFO wait queue
pub struct Condvar {
    waiters: WaitQueue,
}

impl Condvar {
    /// Create a condition variable with no waiters.
    pub const fn new() -> Self {
        Self {
            waiters: WaitQueue::new(),
        }
    }

    /// Atomically release `mutex` and park until signaled, then re-acquire.
    ///
    /// The gate closes before the mutex is released, so no signal can slip
    /// in between the release and the park and be lost. Fails with
    /// [`Error::NotOwner`] if the caller does not hold the mutex.
    pub fn wait(&self, mutex: &Mutex) -> Result {
        let me = thread::current_id();

        preempt::enter();
        if !mutex.held_by_current() {
            preempt::leave();
            return Err(Error::NotOwner);
        }

        self.waiters.push(me);
        sched::with_sched(|s| s.park_current());
        mutex.release_and_wake();
        sched::schedule();
        preempt::leave();

        // Awake again; contend for the mutex like everyone else.
        mutex.lock()
    }

    /// Wake the oldest waiter, if any. Signals are not stored.
    pub fn signal(&self) {
        if !sched::is_initialized() {
            // No runtime yet means nothing can be parked here.
            return;
        }

        preempt::enter();
        if let Some(tid) = self.waiters.pop() {
            sched::with_sched(|s| s.make_ready(tid));
        }
        preempt::leave();
    }

    /// Wake every current waiter.
    ///
    /// Drains the queue under one gate closure; threads that wait after the
    /// drain began are not woken.
    pub fn broadcast(&self) {
        if !sched::is_initialized() {
            return;
        }

        preempt::enter();
        while let Some(tid) = self.waiters.pop() {
            sched::with_sched(|s| s.make_ready(tid));
        }
        preempt::leave();
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
