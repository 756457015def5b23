// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Scheduler
//!
//! This module implements the priority scheduler: the run queue of READY
//! threads, the dispatch routine that performs context swaps, and the
//! global scheduler singleton.
//!
//! # Design
//!
//! - **Priority-ordered run queue**: higher priority runs first; threads of
//!   equal priority run round-robin in FIFO order.
//! - **Caller places, scheduler picks**: `schedule` never decides the
//!   outgoing thread's fate. Whoever calls it (yield, exit, a lock, a wait)
//!   has already put the outgoing thread on the run queue, a wait queue, or
//!   nowhere at all.
//! - **Gate-serialized**: the scheduler is only ever touched with the
//!   preemption signal masked, from the single OS thread that hosts the
//!   runtime. That contract is what makes the `unsafe` cell below sound.
//!
//! # Thread States
//!
//! ```text
//! Created -> Ready <-> Running -> Terminated
//!              ^          |
//!              |          v
//!              +------ Blocked
//! ```

use crate::context::Context;
use crate::err::{Error, Result};
use crate::preempt;
use crate::thread::{EntryFn, Priority, RetVal, Thread, ThreadId, ThreadState};
use std::collections::VecDeque;

/// ============================================================================
/// Run Queue
/// ============================================================================

/// Run queue entry
#[derive(Debug, Clone, Copy)]
struct RunQueueEntry {
    tid: ThreadId,
    priority: Priority,
}

/// Priority-ordered queue of READY threads
///
/// Kept sorted by non-increasing priority; insertion among equal priorities
/// goes to the tail of the run, so each priority class is FIFO.
pub(crate) struct RunQueue {
    queue: VecDeque<RunQueueEntry>,
}

impl RunQueue {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Insert a thread, preserving the priority ordering.
    ///
    /// Must not allocate when capacity has been reserved for every live
    /// thread: the preemption handler enqueues through this path.
    fn enqueue(&mut self, tid: ThreadId, priority: Priority) {
        debug_assert!(
            !self.queue.iter().any(|e| e.tid == tid),
            "thread {} is already on the run queue",
            tid
        );

        let entry = RunQueueEntry { tid, priority };
        match self.queue.iter().position(|e| e.priority < priority) {
            Some(pos) => self.queue.insert(pos, entry),
            None => self.queue.push_back(entry),
        }
    }

    /// Remove and return the highest-priority thread, oldest among ties.
    fn dequeue(&mut self) -> Option<ThreadId> {
        self.queue.pop_front().map(|e| e.tid)
    }

    /// Grow capacity ahead of time so enqueue stays allocation-free.
    fn reserve_for(&mut self, live_threads: usize) {
        if self.queue.capacity() < live_threads {
            self.queue.reserve(live_threads.saturating_sub(self.queue.len()));
        }
    }
}

/// ============================================================================
/// Scheduler Statistics
/// ============================================================================

/// Scheduler statistics
///
/// `context_switches` counts actual swaps; `schedules` counts every pick,
/// including the degenerate pick of the running thread itself. `yields`
/// counts voluntary and preemptive yields together, `preemptions` only the
/// timer-driven subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub context_switches: u64,
    pub schedules: u64,
    pub yields: u64,
    pub preemptions: u64,
}

/// ============================================================================
/// Scheduler
/// ============================================================================

/// The scheduler: thread table, run queue and current-thread pointer.
///
/// Threads live in a slab indexed by id. Ids are never reused; a slot goes
/// back to `None` when the thread is joined, which is also when its stack
/// is freed.
pub(crate) struct Scheduler {
    threads: Vec<Option<Thread>>,
    run_queue: RunQueue,
    current: ThreadId,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Build the scheduler around the calling thread, captured as id 0.
    ///
    /// The initial thread's context is captured in place; it owns no stack
    /// of its own and starts out RUNNING.
    fn with_initial_thread() -> Self {
        Self {
            threads: vec![Some(Thread::initial())],
            run_queue: RunQueue::new(),
            current: ThreadId(0),
            stats: SchedulerStats::default(),
        }
    }

    /// Create a new thread and enqueue it READY.
    ///
    /// Allocates the stack, binds a fresh context to the entry trampoline
    /// (inheriting the currently-masked signal state), and inserts the
    /// thread into the run queue by priority. Returns the assigned id.
    pub(crate) fn create(
        &mut self,
        entry: Box<EntryFn>,
        priority: Priority,
    ) -> Result<ThreadId> {
        let id = ThreadId(self.threads.len());

        let mut stack = Vec::new();
        stack
            .try_reserve_exact(crate::thread::STACK_SIZE)
            .map_err(|_| Error::NoMemory)?;
        stack.resize(crate::thread::STACK_SIZE, 0u8);

        let context = Context::with_stack(stack.into_boxed_slice(), crate::thread::trampoline)?;

        let mut thread = Thread::new(id, priority, context);
        thread.entry = Some(entry);
        thread.state = ThreadState::Ready;
        self.threads.push(Some(thread));

        let live = self.live_count();
        self.run_queue.reserve_for(live);
        self.run_queue.enqueue(id, priority);

        Ok(id)
    }

    pub(crate) fn current_id(&self) -> ThreadId {
        self.current
    }

    pub(crate) fn current_is_running(&self) -> bool {
        self.state_of(self.current) == Some(ThreadState::Running)
    }

    pub(crate) fn state_of(&self, tid: ThreadId) -> Option<ThreadState> {
        self.threads.get(tid.0).and_then(|t| t.as_ref()).map(|t| t.state)
    }

    /// Demote the running current thread to READY and re-enqueue it.
    pub(crate) fn requeue_current(&mut self) {
        let tid = self.current;
        let priority = match self.thread_mut(tid) {
            Some(thread) => {
                debug_assert_eq!(thread.state, ThreadState::Running);
                thread.state = ThreadState::Ready;
                thread.priority
            }
            None => return,
        };
        self.run_queue.enqueue(tid, priority);
    }

    /// Mark the current thread BLOCKED.
    ///
    /// The caller has already appended it to the wait queue it parks on.
    pub(crate) fn park_current(&mut self) {
        let tid = self.current;
        if let Some(thread) = self.thread_mut(tid) {
            thread.state = ThreadState::Blocked;
        }
    }

    /// Mark the current thread TERMINATED and record its return value.
    pub(crate) fn terminate_current(&mut self, retval: RetVal) {
        let tid = self.current;
        if let Some(thread) = self.thread_mut(tid) {
            thread.state = ThreadState::Terminated;
            thread.retval = Some(retval);
        }
    }

    /// Wake a blocked thread: READY it and put it back on the run queue.
    pub(crate) fn make_ready(&mut self, tid: ThreadId) {
        let priority = match self.thread_mut(tid) {
            Some(thread) => {
                debug_assert_eq!(thread.state, ThreadState::Blocked);
                thread.state = ThreadState::Ready;
                thread.priority
            }
            None => return,
        };
        self.run_queue.enqueue(tid, priority);
    }

    /// Take the entry closure out of the current thread's TCB.
    ///
    /// Called once, by the trampoline, on first dispatch.
    pub(crate) fn take_current_entry(&mut self) -> Option<Box<EntryFn>> {
        let tid = self.current;
        self.thread_mut(tid).and_then(|t| t.entry.take())
    }

    /// Drop a terminated thread and hand back its return value.
    ///
    /// Frees the slab slot and with it the thread's stack.
    pub(crate) fn reap(&mut self, tid: ThreadId) -> Result<RetVal> {
        debug_assert_eq!(self.state_of(tid), Some(ThreadState::Terminated));
        let thread = self
            .threads
            .get_mut(tid.0)
            .and_then(|slot| slot.take())
            .ok_or(Error::NotFound)?;
        thread.retval.ok_or(Error::Internal)
    }

    pub(crate) fn bump_yields(&mut self) {
        self.stats.yields += 1;
    }

    pub(crate) fn bump_preemptions(&mut self) {
        self.stats.preemptions += 1;
    }

    fn live_count(&self) -> usize {
        self.threads.iter().filter(|t| t.is_some()).count()
    }

    fn thread_mut(&mut self, tid: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(tid.0).and_then(|t| t.as_mut())
    }

    /// Pick the next thread and stage the swap.
    fn pick_next(&mut self) -> Dispatch {
        let prev = self.current;

        let next = match self.run_queue.dequeue() {
            Some(tid) => tid,
            None => {
                return match self.state_of(prev) {
                    // All work is done.
                    Some(ThreadState::Terminated) => Dispatch::AllDone,
                    // Nothing else is runnable; keep running the current
                    // thread (a tick can land while every peer is blocked).
                    Some(ThreadState::Running) => Dispatch::Stay,
                    // The current thread parked itself and nobody can ever
                    // wake it.
                    _ => Dispatch::Deadlock,
                };
            }
        };

        self.stats.schedules += 1;

        if next == prev {
            // The current thread re-enqueued itself and won its own slot
            // back; no swap, no switch counted.
            if let Some(thread) = self.thread_mut(next) {
                thread.state = ThreadState::Running;
            }
            return Dispatch::Stay;
        }

        self.current = next;
        self.stats.context_switches += 1;

        let next_ctx = match self.thread_mut(next) {
            Some(thread) => {
                thread.state = ThreadState::Running;
                thread.context_ptr() as *const Context
            }
            None => return Dispatch::Deadlock,
        };
        let prev_ctx = match self.thread_mut(prev) {
            Some(thread) => thread.context_ptr(),
            None => return Dispatch::Deadlock,
        };

        Dispatch::Swap { prev_ctx, next_ctx }
    }
}

/// Outcome of a scheduling decision
enum Dispatch {
    /// Swap from the outgoing context into the chosen one
    Swap {
        prev_ctx: *mut Context,
        next_ctx: *const Context,
    },
    /// Keep running the current thread
    Stay,
    /// Run queue empty and the current thread is terminated
    AllDone,
    /// Run queue empty and the current thread can never run again
    Deadlock,
}

/// ============================================================================
/// Global scheduler instance
/// ============================================================================

/// Cell holding the scheduler singleton.
///
/// Interior mutability without a lock: the signal gate is the lock. Access
/// happens only from the runtime's home OS thread with the preemption
/// signal masked, which `with_sched` checks in debug builds.
struct SchedCell {
    inner: core::cell::UnsafeCell<Option<Scheduler>>,
}

// SAFETY: the runtime is confined to one OS thread; the preemption gate
// serializes every access, including the signal handler's.
unsafe impl Sync for SchedCell {}

static SCHEDULER: SchedCell = SchedCell {
    inner: core::cell::UnsafeCell::new(None),
};

static INIT: spin::Once = spin::Once::new();

/// Run one-time library initialization.
///
/// Captures the calling thread as thread 0, installs the preemption
/// handler, and arms the periodic timer. Subsequent calls are no-ops; the
/// first call from any path (create, lock, yield) wins.
pub(crate) fn ensure_init() {
    INIT.call_once(|| {
        let scheduler = Scheduler::with_initial_thread();

        preempt::enter();
        // SAFETY: first and only write of the singleton, before the timer
        // exists; nothing can observe it concurrently.
        unsafe {
            *SCHEDULER.inner.get() = Some(scheduler);
        }
        preempt::leave();

        if let Err(e) = preempt::install() {
            panic!("failed to arm the preemption timer: {}", e);
        }

        log::info!(
            "threadux runtime initialized (quantum {} ms, stack {} KiB)",
            preempt::QUANTUM.as_millis(),
            crate::thread::STACK_SIZE / 1024
        );
    });
}

pub(crate) fn is_initialized() -> bool {
    INIT.is_completed()
}

/// Execute a closure against the scheduler singleton.
///
/// Callers must hold the signal gate (or run inside the handler, where the
/// signal is auto-masked).
pub(crate) fn with_sched<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    debug_assert!(
        preempt::is_masked(),
        "scheduler touched outside the signal gate"
    );

    // SAFETY: gate closed + single home thread means no aliasing access.
    let sched = unsafe { (*SCHEDULER.inner.get()).as_mut() };
    match sched {
        Some(s) => f(s),
        None => panic!("threading runtime not initialized"),
    }
}

/// Dispatch the next ready thread.
///
/// Called with the gate closed, after the caller has placed the outgoing
/// thread. Returns when the outgoing thread is next scheduled — or never,
/// if it terminated. Nothing on this path logs or allocates.
pub(crate) fn schedule() {
    let dispatch = with_sched(|s| s.pick_next());

    match dispatch {
        Dispatch::Swap { prev_ctx, next_ctx } => {
            // SAFETY: both contexts are boxed and alive; the scheduler
            // borrow ended above, and the gate is still closed.
            unsafe { Context::swap(prev_ctx, next_ctx) };
            // Now resumed: some other thread swapped back into us. The gate
            // is closed (saved as part of our context); our caller reopens
            // it.
        }
        Dispatch::Stay => {}
        Dispatch::AllDone => {
            log::info!("all threads terminated, exiting");
            std::process::exit(0);
        }
        Dispatch::Deadlock => {
            log::error!("deadlock: run queue empty and the current thread cannot continue");
            std::process::abort();
        }
    }
}

/// Snapshot of the scheduler statistics.
pub fn stats() -> SchedulerStats {
    ensure_init();
    preempt::enter();
    let stats = with_sched(|s| s.stats);
    preempt::leave();
    stats
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: usize) -> ThreadId {
        ThreadId(n)
    }

    #[test]
    fn test_run_queue_priority_order() {
        let mut rq = RunQueue::new();
        rq.enqueue(tid(1), Priority(0));
        rq.enqueue(tid(2), Priority(10));
        rq.enqueue(tid(3), Priority(5));

        assert_eq!(rq.dequeue(), Some(tid(2)));
        assert_eq!(rq.dequeue(), Some(tid(3)));
        assert_eq!(rq.dequeue(), Some(tid(1)));
        assert_eq!(rq.dequeue(), None);
    }

    #[test]
    fn test_run_queue_fifo_within_priority() {
        let mut rq = RunQueue::new();
        rq.enqueue(tid(1), Priority(3));
        rq.enqueue(tid(2), Priority(3));
        rq.enqueue(tid(3), Priority(3));

        assert_eq!(rq.dequeue(), Some(tid(1)));
        assert_eq!(rq.dequeue(), Some(tid(2)));
        assert_eq!(rq.dequeue(), Some(tid(3)));
    }

    #[test]
    fn test_run_queue_equal_priority_behind_higher() {
        let mut rq = RunQueue::new();
        rq.enqueue(tid(1), Priority(7));
        rq.enqueue(tid(2), Priority(0));
        rq.enqueue(tid(3), Priority(7));

        // Ordering invariant: non-increasing priority front to back.
        assert_eq!(rq.dequeue(), Some(tid(1)));
        assert_eq!(rq.dequeue(), Some(tid(3)));
        assert_eq!(rq.dequeue(), Some(tid(2)));
    }

    #[test]
    fn test_run_queue_reserve_keeps_len() {
        let mut rq = RunQueue::new();
        rq.enqueue(tid(1), Priority(0));
        rq.reserve_for(8);
        assert_eq!(rq.queue.len(), 1);
        assert!(rq.queue.capacity() >= 8);
    }

    #[test]
    fn test_stats_default() {
        let stats = SchedulerStats::default();
        assert_eq!(stats.context_switches, 0);
        assert_eq!(stats.schedules, 0);
        assert_eq!(stats.yields, 0);
        assert_eq!(stats.preemptions, 0);
    }
}
