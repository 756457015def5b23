// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Management
//!
//! This module provides the thread control block and the public thread API:
//! creation with priorities, voluntary yield, exit with a return value, and
//! join.
//!
//! # Design
//!
//! - Ids are assigned monotonically from 1; the initial thread is id 0
//! - Threads move through Created, Ready, Running, Blocked, Terminated
//! - Each spawned thread owns a fixed 64 KiB stack, freed when joined
//! - The entry trampoline re-enables preemption, runs the user closure and
//!   exits with whatever it returned
//!
//! # Usage
//!
//! ```no_run
//! use threadux::{join, spawn};
//!
//! let id = spawn(|| {
//!     // runs concurrently with the spawner
//!     42
//! }).unwrap();
//!
//! assert_eq!(join(id).unwrap(), 42);
//! ```

use crate::context::Context;
use crate::err::{Error, Result};
use crate::preempt;
use crate::sched::{self, Scheduler};
use core::fmt;

/// Stack size of every spawned thread (the initial thread keeps the stack
/// the process gave it).
pub const STACK_SIZE: usize = 64 * 1024;

/// Opaque per-thread return value: one machine word, set only on exit and
/// read back by `join`.
pub type RetVal = usize;

/// Boxed thread entry closure
pub(crate) type EntryFn = dyn FnOnce() -> RetVal;

/// ============================================================================
/// Thread Id, State, Priority
/// ============================================================================

/// Thread identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub usize);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Created but not yet enqueued
    Created,

    /// On the run queue, waiting to be dispatched
    Ready,

    /// Currently executing; exactly one thread is in this state
    Running,

    /// Parked on some primitive's wait queue
    Blocked,

    /// Exited; stays terminated until joined
    Terminated,
}

impl ThreadState {
    /// Whether the thread can be picked by the scheduler
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Whether the thread has exited
    pub const fn has_exited(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Thread priority: larger values run first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Default priority for `spawn`
    pub const DEFAULT: Priority = Priority(0);
}

/// ============================================================================
/// Thread Control Block
/// ============================================================================

/// Thread control block
///
/// Owned by the scheduler's thread table. The context is boxed so its
/// address survives table growth; the stack lives inside the context.
pub(crate) struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    pub(crate) priority: Priority,
    context: Box<Context>,
    pub(crate) entry: Option<Box<EntryFn>>,
    pub(crate) retval: Option<RetVal>,
}

impl Thread {
    /// The initial thread: captured in place, already running.
    pub(crate) fn initial() -> Self {
        Self {
            id: ThreadId(0),
            state: ThreadState::Running,
            priority: Priority::DEFAULT,
            context: Context::for_initial(),
            entry: None,
            retval: None,
        }
    }

    pub(crate) fn new(id: ThreadId, priority: Priority, context: Box<Context>) -> Self {
        Self {
            id,
            state: ThreadState::Created,
            priority,
            context,
            entry: None,
            retval: None,
        }
    }

    /// Stable pointer to this thread's context, valid until the TCB drops.
    pub(crate) fn context_ptr(&mut self) -> *mut Context {
        &mut *self.context as *mut Context
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("priority", &self.priority.0)
            .finish()
    }
}

/// ============================================================================
/// Thread API
/// ============================================================================

/// Create a thread at the default priority.
///
/// Runs one-time library init if needed, then builds a fresh context whose
/// entry is the trampoline below and enqueues the new thread READY.
/// Returns the assigned id.
pub fn spawn<F>(f: F) -> Result<ThreadId>
where
    F: FnOnce() -> RetVal + 'static,
{
    spawn_with_priority(f, Priority::DEFAULT)
}

/// Create a thread with an explicit priority.
///
/// A new thread of higher priority than the caller does not preempt it
/// synchronously; it wins at the caller's next yield or timer tick.
pub fn spawn_with_priority<F>(f: F, priority: Priority) -> Result<ThreadId>
where
    F: FnOnce() -> RetVal + 'static,
{
    sched::ensure_init();

    preempt::enter();
    let id = sched::with_sched(|s| s.create(Box::new(f), priority));
    preempt::leave();

    if let Ok(id) = id {
        log::debug!("created thread {} (priority {})", id, priority.0);
    }
    id
}

/// Give up the processor to the next ready thread.
///
/// A no-op before the library has been initialized. If the caller is still
/// RUNNING it is demoted to READY and re-enqueued behind its priority
/// class; then the scheduler picks again.
pub fn yield_now() {
    if !sched::is_initialized() {
        return;
    }

    preempt::enter();
    sched::with_sched(yield_inner);
    sched::schedule();
    preempt::leave();
}

/// Timer-driven yield. Runs inside the signal handler: no logs, no
/// allocation.
pub(crate) fn preempted() {
    preempt::enter();
    sched::with_sched(|s| {
        s.bump_preemptions();
        yield_inner(s);
    });
    sched::schedule();
    preempt::leave();
}

fn yield_inner(s: &mut Scheduler) {
    s.bump_yields();
    if s.current_is_running() {
        s.requeue_current();
    }
}

/// Terminate the calling thread with a return value.
///
/// The value is held in the TCB until some thread joins us. Does not
/// return; if this was the last runnable thread the process exits with
/// status 0.
pub fn exit(retval: RetVal) -> ! {
    sched::ensure_init();
    log::debug!("thread {} exiting", current_id());

    preempt::enter();
    sched::with_sched(|s| s.terminate_current(retval));
    sched::schedule();

    unreachable!("terminated thread was scheduled again");
}

/// Wait for a thread to terminate and collect its return value.
///
/// Spin-waits by repeated yield, then frees the target's TCB and stack.
/// Each thread can be joined exactly once; a second join, or a join of an
/// unknown id, reports [`Error::NotFound`]. Joining self or the initial
/// thread reports [`Error::InvalidArgs`].
pub fn join(id: ThreadId) -> Result<RetVal> {
    if id == current_id() || id == ThreadId(0) {
        return Err(Error::InvalidArgs);
    }

    loop {
        preempt::enter();
        match sched::with_sched(|s| s.state_of(id)) {
            None => {
                preempt::leave();
                return Err(Error::NotFound);
            }
            Some(ThreadState::Terminated) => break,
            Some(_) => {
                preempt::leave();
                yield_now();
            }
        }
    }

    // Gate is still closed from the loop break.
    let retval = sched::with_sched(|s| s.reap(id));
    preempt::leave();

    if retval.is_ok() {
        log::debug!("joined thread {}", id);
    }
    retval
}

/// Id of the calling thread.
pub fn current_id() -> ThreadId {
    sched::ensure_init();
    preempt::enter();
    let id = sched::with_sched(|s| s.current_id());
    preempt::leave();
    id
}

/// Entry point of every spawned thread.
///
/// Runs with the preemption signal still masked: the context was made
/// inside create's critical section and the swap that dispatched us
/// happened inside another. This path owns the matching leave.
pub(crate) extern "C" fn trampoline() {
    let entry = sched::with_sched(|s| s.take_current_entry());
    preempt::leave();

    let retval = match entry {
        Some(f) => f(),
        None => unreachable!("thread dispatched without an entry closure"),
    };

    exit(retval);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_helpers() {
        assert!(ThreadState::Ready.is_schedulable());
        assert!(ThreadState::Running.is_schedulable());
        assert!(!ThreadState::Blocked.is_schedulable());
        assert!(ThreadState::Terminated.has_exited());
        assert!(!ThreadState::Created.has_exited());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority(10) > Priority(0));
        assert!(Priority(-5) < Priority::DEFAULT);
    }

    #[test]
    fn test_thread_id_display() {
        assert_eq!(ThreadId(7).to_string(), "7");
    }
}
