// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Preemption Signal
//!
//! This module owns the asynchronous side of the scheduler: the periodic
//! timer that drives preemption and the signal gate that makes scheduler
//! and queue code non-interruptible with respect to it.
//!
//! # Design
//!
//! - **One signal**: `SIGVTALRM`, delivered by a POSIX interval timer
//!   directed at the OS thread that initialized the runtime. Other threads
//!   in the host process (a test harness, for example) never receive it.
//! - **The gate is the lock**: every mutation of the run queue, a wait
//!   queue, a TCB state field or the current-thread pointer happens with
//!   the signal masked. Entering an already-closed gate is idempotent and a
//!   single leave unmasks.
//! - **Handler reentry**: the handler runs with the signal auto-masked, so
//!   it may touch scheduler state directly; the yield it triggers closes
//!   and reopens the gate like any voluntary yield.

use crate::err::{Error, Result};
use crate::{sched, thread};
use core::mem;
use core::ptr;
use core::sync::atomic::{AtomicI32, Ordering};
use core::time::Duration;

/// Preemption quantum. Balances responsiveness against switch overhead.
pub const QUANTUM: Duration = Duration::from_millis(50);

/// Signal used to drive preemption.
const PREEMPT_SIGNAL: libc::c_int = libc::SIGVTALRM;

/// Kernel tid of the OS thread the runtime lives on. Set once at install.
static HOME_TID: AtomicI32 = AtomicI32::new(0);

// ============================================================================
// Signal gate
// ============================================================================

/// Close the gate: mask the preemption signal on the calling thread.
pub(crate) fn enter() {
    mask(libc::SIG_BLOCK);
}

/// Open the gate: unmask the preemption signal on the calling thread.
pub(crate) fn leave() {
    mask(libc::SIG_UNBLOCK);
}

/// Whether the preemption signal is currently masked.
///
/// Used by debug assertions guarding scheduler access.
pub(crate) fn is_masked() -> bool {
    // SAFETY: querying the mask of the calling thread with valid pointers.
    unsafe {
        let mut old: libc::sigset_t = mem::zeroed();
        libc::pthread_sigmask(libc::SIG_SETMASK, ptr::null(), &mut old);
        libc::sigismember(&old, PREEMPT_SIGNAL) == 1
    }
}

fn mask(how: libc::c_int) {
    // SAFETY: set is initialized by sigemptyset before use; pthread_sigmask
    // with a valid how and set cannot fail.
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, PREEMPT_SIGNAL);
        libc::pthread_sigmask(how, &set, ptr::null_mut());
    }
}

// ============================================================================
// Preemption timer
// ============================================================================

/// Install the signal handler and arm the periodic timer.
///
/// Called exactly once, from runtime init, on the thread that will host the
/// scheduler. The timer is process-lifetime state and is never disarmed.
pub(crate) fn install() -> Result {
    // SAFETY: all structures are zero-initialized before the fields the
    // kernel reads are set; the syscalls are used per their contracts.
    unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::pid_t;
        HOME_TID.store(tid, Ordering::SeqCst);

        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_sigaction = on_tick as extern "C" fn(libc::c_int) as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(PREEMPT_SIGNAL, &sa, ptr::null_mut()) != 0 {
            return Err(Error::Internal);
        }

        // Thread-directed delivery: the tick always lands on the runtime's
        // home thread, never on an unrelated thread of the host process.
        let mut sev: libc::sigevent = mem::zeroed();
        sev.sigev_notify = libc::SIGEV_THREAD_ID;
        sev.sigev_signo = PREEMPT_SIGNAL;
        sev.sigev_notify_thread_id = tid;

        let mut timer: libc::timer_t = ptr::null_mut();
        if libc::timer_create(libc::CLOCK_MONOTONIC, &mut sev, &mut timer) != 0 {
            return Err(Error::Internal);
        }

        let interval = libc::itimerspec {
            it_interval: timespec_of(QUANTUM),
            it_value: timespec_of(QUANTUM),
        };
        if libc::timer_settime(timer, 0, &interval, ptr::null_mut()) != 0 {
            return Err(Error::Internal);
        }
    }

    Ok(())
}

fn timespec_of(d: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    }
}

/// Timer tick handler.
///
/// Runs with the preemption signal auto-masked. Nothing on this path logs
/// or allocates.
extern "C" fn on_tick(_signum: libc::c_int) {
    // A stray process-directed signal could still land on a foreign thread;
    // the scheduler must only ever be touched from its home thread.
    // SAFETY: gettid takes no arguments and always succeeds.
    let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::pid_t;
    if tid != HOME_TID.load(Ordering::SeqCst) {
        return;
    }

    if !sched::is_initialized() {
        return;
    }

    // Only preempt a thread that is actually running; a tick that interrupts
    // the tail of a library call finds the current thread already placed.
    if sched::with_sched(|s| s.current_is_running()) {
        thread::preempted();
    }
}
