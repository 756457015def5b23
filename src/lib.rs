// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! threadux — user-space threads for a single OS process
//!
//! A threading library that multiplexes many threads of execution onto one
//! operating-system thread: its own thread control blocks, a priority
//! scheduler with timer-driven preemption, and blocking mutexes, condition
//! variables and counting semaphores.
//!
//! # Design
//!
//! - **Priority scheduling**: larger priority runs first; equal priorities
//!   round-robin in FIFO order under a 50 ms preemption quantum
//! - **Signal-driven preemption**: a periodic timer signal forces a yield;
//!   a signal gate makes all queue and state manipulation atomic with
//!   respect to it
//! - **Blocking primitives**: contended locks and empty semaphores park
//!   their callers on FIFO wait queues instead of spinning
//! - **Join with value propagation**: every spawned thread returns one
//!   opaque word, collected (and its stack freed) by `join`
//!
//! The library is initialized lazily by the first call that needs it;
//! whichever thread makes that call becomes thread 0. Linux only.
//!
//! # Usage
//!
//! ```no_run
//! use threadux::{join, spawn, spawn_with_priority, Priority};
//!
//! let worker = spawn(|| 7).unwrap();
//! let urgent = spawn_with_priority(|| 0, Priority(10)).unwrap();
//!
//! assert_eq!(join(worker).unwrap(), 7);
//! join(urgent).unwrap();
//! ```

mod context;
mod err;
mod preempt;
mod sched;
pub mod sync;
mod thread;

pub use err::{Error, Result};
pub use preempt::QUANTUM;
pub use sched::{stats, SchedulerStats};
pub use thread::{
    current_id, exit, join, spawn, spawn_with_priority, yield_now, Priority, RetVal, ThreadId,
    ThreadState, STACK_SIZE,
};
