// Copyright 2025 The Threadux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Execution Context
//!
//! This module wraps the host's user-context facility (`getcontext`,
//! `makecontext`, `swapcontext`) behind a small, owned abstraction.
//! A [`Context`] is a saved machine state — stack pointer, instruction
//! pointer, callee-saved registers and signal mask — plus, for every thread
//! except the initial one, the heap-allocated stack it runs on.
//!
//! # Design
//!
//! - **Boxed, never moved**: `ucontext_t` is not position-independent on
//!   all hosts, so a `Context` always lives behind a `Box` and stays at a
//!   stable address for the lifetime of its thread.
//! - **Swap is the only migration point**: execution moves between threads
//!   exclusively through [`Context::swap`].
//! - **Mask preservation**: the host saves and restores the signal mask as
//!   part of the context, so a thread suspended with the preemption signal
//!   masked resumes with it still masked.

use crate::err::{Error, Result};
use core::mem;
use core::ptr;

/// A saved machine context and the stack it executes on.
///
/// The initial thread's context is captured in place and carries no stack of
/// its own; its stack belongs to the process.
pub(crate) struct Context {
    uctx: libc::ucontext_t,
    stack: Option<Box<[u8]>>,
}

impl Context {
    /// Create the context slot for the initial thread.
    ///
    /// The contents are filled in by the first swap away from the thread;
    /// until then the slot is never read.
    pub(crate) fn for_initial() -> Box<Context> {
        Box::new(Context {
            // SAFETY: ucontext_t is plain data; an all-zero value is a valid
            // target for swapcontext's save phase.
            uctx: unsafe { mem::zeroed() },
            stack: None,
        })
    }

    /// Build a context that will enter `entry` on `stack` when first resumed.
    ///
    /// Must be called with the preemption signal masked: the captured signal
    /// mask becomes the new thread's initial mask, and the entry trampoline
    /// is responsible for unmasking.
    pub(crate) fn with_stack(mut stack: Box<[u8]>, entry: extern "C" fn()) -> Result<Box<Context>> {
        let mut ctx = Box::new(Context {
            // SAFETY: zeroed ucontext_t is valid input for getcontext.
            uctx: unsafe { mem::zeroed() },
            stack: None,
        });

        // SAFETY: ctx.uctx is a valid, writable ucontext_t. The stack region
        // outlives the context because both move into the same box below.
        unsafe {
            if libc::getcontext(&mut ctx.uctx) != 0 {
                return Err(Error::Internal);
            }
            ctx.uctx.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
            ctx.uctx.uc_stack.ss_size = stack.len();
            ctx.uctx.uc_link = ptr::null_mut();
            libc::makecontext(&mut ctx.uctx, entry, 0);
        }

        ctx.stack = Some(stack);
        Ok(ctx)
    }

    /// Save the running machine state into `from` and resume `to`.
    ///
    /// Returns when (and if) some later swap resumes `from` again.
    ///
    /// # Safety
    ///
    /// Both pointers must reference live, boxed contexts, and `to` must hold
    /// a previously saved or freshly made state. The caller must hold the
    /// preemption gate so the swap cannot be interrupted mid-save.
    pub(crate) unsafe fn swap(from: *mut Context, to: *const Context) {
        // swapcontext only fails on invalid arguments, which the pointer
        // contract above rules out.
        let _ = libc::swapcontext(&mut (*from).uctx, &(*to).uctx);
    }
}
