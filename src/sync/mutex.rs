// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Blocking Mutex
//!
//! Mutual exclusion with ownership tracking and a FIFO wait queue. Unlike a
//! spinlock, a loser of the acquire race parks itself and costs no CPU
//! until the holder releases.
//!
//! # Design
//!
//! - **Two-level protocol**: the `locked` flag is an atomic test-and-set
//!   taken outside the signal gate; only the park/wake bookkeeping runs
//!   inside it.
//! - **Retry, not hand-off**: release clears the flag before waking, and a
//!   woken waiter re-runs the test-and-set. A higher-priority thread that
//!   races in between wins the lock, which is exactly the priority
//!   behavior the scheduler promises.
//! - **Fair wake ordering**: waiters are woken one at a time, oldest first.
//!
//! # Usage
//!
//! ```no_run
//! use threadux::sync::Mutex;
//!
//! static LOCK: Mutex = Mutex::new();
//!
//! LOCK.lock().unwrap();
//! // critical section
//! LOCK.unlock().unwrap();
//! ```

use crate::err::{Error, Result};
use crate::preempt;
use crate::sched;
use crate::sync::wait_queue::WaitQueue;
use crate::thread::{self, ThreadId};
use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Mutual exclusion lock
///
/// `locked` is true iff `owner` is set; waiters are BLOCKED and never on
/// the run queue.
pub struct Mutex {
    /// Lock flag, updated with atomic test-and-set / atomic release
    locked: AtomicBool,

    /// Thread currently holding the lock
    owner: Cell<Option<ThreadId>>,

    /// Threads blocked waiting to acquire
    waiters: WaitQueue,
}

// SAFETY: all green threads share one OS thread; owner is only written by
// the thread that holds (or just took) the lock, and the wait queue is
// gate-serialized.
unsafe impl Send for Mutex {}
unsafe impl Sync for Mutex {}

impl Mutex {
    /// Create an unlocked mutex.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            owner: Cell::new(None),
            waiters: WaitQueue::new(),
        }
    }

    /// Acquire the lock, parking the caller while it is contended.
    pub fn lock(&self) -> Result {
        let me = thread::current_id();

        // Test-and-set until we win. Losing parks us on the wait queue;
        // being woken does not transfer ownership, it grants another try.
        while self.locked.swap(true, Ordering::SeqCst) {
            preempt::enter();
            // The holder may have released between the failed test-and-set
            // and closing the gate; parking then would strand us with an
            // empty wake path. A set flag under the gate means a live
            // holder, and the holder cannot release while the gate is shut.
            if !self.locked.load(Ordering::SeqCst) {
                preempt::leave();
                continue;
            }
            self.waiters.push(me);
            sched::with_sched(|s| s.park_current());
            sched::schedule();
            preempt::leave();
        }

        self.owner.set(Some(me));
        Ok(())
    }

    /// Acquire the lock without blocking. Returns whether it was taken.
    pub fn try_lock(&self) -> bool {
        let me = thread::current_id();
        if self.locked.swap(true, Ordering::SeqCst) {
            false
        } else {
            self.owner.set(Some(me));
            true
        }
    }

    /// Release the lock and wake the oldest waiter, if any.
    ///
    /// Fails with [`Error::NotOwner`] — and changes nothing — when the
    /// caller does not hold the lock.
    pub fn unlock(&self) -> Result {
        if self.owner.get() != Some(thread::current_id()) {
            return Err(Error::NotOwner);
        }

        preempt::enter();
        self.release_and_wake();
        preempt::leave();
        Ok(())
    }

    /// Whether the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// The holder's id, or `None` when unlocked.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner.get()
    }

    /// Clear the flag, then move the head waiter to the run queue.
    ///
    /// Gate must be closed. The flag release precedes the wake, so a
    /// just-woken waiter usually finds the lock free; the retry loop in
    /// `lock` absorbs the case where somebody else got there first.
    pub(crate) fn release_and_wake(&self) {
        self.owner.set(None);
        self.locked.store(false, Ordering::SeqCst);

        if let Some(next) = self.waiters.pop() {
            sched::with_sched(|s| s.make_ready(next));
        }
    }

    /// Whether the calling thread holds this lock. Gate must be closed.
    pub(crate) fn held_by_current(&self) -> bool {
        self.owner.get() == Some(sched::with_sched(|s| s.current_id()))
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unlocked() {
        let mutex = Mutex::new();
        assert!(!mutex.is_locked());
        assert!(mutex.owner().is_none());
    }

    #[test]
    fn test_default_matches_new() {
        let mutex = Mutex::default();
        assert!(!mutex.is_locked());
    }
}
