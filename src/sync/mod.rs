// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Synchronization Primitives
//!
//! Blocking primitives for threadux threads. All of them park waiters on a
//! per-primitive FIFO wait queue and hand them back to the scheduler's run
//! queue on release or signal.
//!
//! # Primitives
//!
//! - **Mutex**: test-and-set acquire with a FIFO blocked-wait queue
//! - **Condvar**: FIFO wait queue with atomic release-and-wait
//! - **Semaphore**: counting primitive built on a mutex plus a condvar

pub mod condvar;
pub mod mutex;
pub mod semaphore;
pub(crate) mod wait_queue;

// Re-exports
pub use condvar::Condvar;
pub use mutex::Mutex;
pub use semaphore::Semaphore;
